use serde::Serialize;
use std::sync::Mutex;

/// Pipeline counters shared by the ingestor, the transformer and their owner.
pub struct PipelineMetrics {
    inner: Mutex<MetricsSnapshot>,
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub packets_received: u64,
    pub undersized_packets: u64,
    pub frames_assembled: u64,
    pub frames_dropped: u64,
    pub frames_transformed: u64,
    pub transform_errors: u64,
    pub results_dropped: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_packet(&self) {
        self.update(|m| m.packets_received += 1);
    }

    pub fn record_undersized(&self) {
        self.update(|m| m.undersized_packets += 1);
    }

    pub fn record_frame_assembled(&self) {
        self.update(|m| m.frames_assembled += 1);
    }

    pub fn record_frame_dropped(&self) {
        self.update(|m| m.frames_dropped += 1);
    }

    pub fn record_frame_transformed(&self) {
        self.update(|m| m.frames_transformed += 1);
    }

    pub fn record_transform_error(&self) {
        self.update(|m| m.transform_errors += 1);
    }

    pub fn record_result_dropped(&self) {
        self.update(|m| m.results_dropped += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
