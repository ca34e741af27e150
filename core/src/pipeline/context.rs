use crate::config::RadarConfig;
use crate::pipeline::frame::{FrameLayout, RawFrame};
use crate::prelude::Padding;
use crate::telemetry::PipelineMetrics;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use log::{info, warn};
use ndarray::{Array3, Axis};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timeouts and capacities shared by the pipeline workers.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub socket_timeout: Duration,
    pub queue_put_timeout: Duration,
    pub queue_get_timeout: Duration,
    pub raw_queue_capacity: usize,
    pub result_queue_capacity: usize,
    pub recv_buffer_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            socket_timeout: Duration::from_millis(100),
            queue_put_timeout: Duration::from_millis(500),
            queue_get_timeout: Duration::from_millis(100),
            raw_queue_capacity: 16,
            result_queue_capacity: 8,
            recv_buffer_size: 2 * 1024 * 1024,
        }
    }
}

/// Single-producer/single-consumer queue whose puts give up instead of stalling.
pub struct BoundedQueue<T> {
    name: &'static str,
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> BoundedQueue<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            name,
            sender,
            receiver,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueues `item`, waiting at most `timeout`. Returns false if it was dropped.
    pub fn offer(&self, item: T, timeout: Duration) -> bool {
        self.offer_until(item, Instant::now() + timeout)
    }

    pub fn offer_until(&self, item: T, deadline: Instant) -> bool {
        match self.sender.send_deadline(item, deadline) {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(_)) | Err(SendTimeoutError::Disconnected(_)) => false,
        }
    }

    /// Enqueues without waiting, handing the item back when the queue is full.
    pub fn try_offer(&self, item: T) -> Result<(), T> {
        self.sender.try_send(item).map_err(|err| match err {
            TrySendError::Full(item) | TrySendError::Disconnected(item) => item,
        })
    }

    pub fn take(&self, timeout: Duration) -> Option<T> {
        self.receiver.recv_timeout(timeout).ok()
    }

    pub fn try_take(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Discards everything queued and returns how many items were removed.
    pub fn drain(&self) -> usize {
        self.receiver.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.sender.is_full()
    }
}

/// One transformed view of a frame, as a magnitude array.
#[derive(Debug, Clone)]
pub struct SpectralFrame {
    pub sequence: u64,
    /// Receiver selected when the frame was transformed.
    pub channel: usize,
    pub padding: Padding,
    pub data: Array3<f64>,
}

impl SpectralFrame {
    /// Mean power over chirps for one antenna of a `[range, antenna, chirp]` array.
    pub fn channel_power(&self, channel: usize) -> Option<Vec<f64>> {
        if channel >= self.data.len_of(Axis(1)) {
            return None;
        }
        let antenna = self.data.index_axis(Axis(1), channel);
        Some(
            antenna
                .outer_iter()
                .map(|bin| {
                    let count = bin.len().max(1) as f64;
                    bin.iter().map(|value| value * value).sum::<f64>() / count
                })
                .collect(),
        )
    }
}

/// Everything the workers share: configuration, queues, channel selection and metrics.
pub struct PipelineContext {
    config: Arc<RadarConfig>,
    layout: FrameLayout,
    settings: PipelineSettings,
    pub raw_frames: BoundedQueue<RawFrame>,
    pub range_profiles: BoundedQueue<SpectralFrame>,
    pub range_doppler: BoundedQueue<SpectralFrame>,
    pub range_angle: BoundedQueue<SpectralFrame>,
    selected_channel: AtomicUsize,
    metrics: PipelineMetrics,
}

impl PipelineContext {
    pub fn new(config: RadarConfig, settings: PipelineSettings) -> Arc<Self> {
        let layout = config.frame_layout();
        info!(
            "pipeline sized for {} samples x {} antennas x {} chirps ({} values per frame)",
            layout.samples,
            layout.antennas,
            layout.chirps,
            layout.frame_length()
        );
        Arc::new(Self {
            config: Arc::new(config),
            layout,
            raw_frames: BoundedQueue::new("raw_frames", settings.raw_queue_capacity),
            range_profiles: BoundedQueue::new("range_profile", settings.result_queue_capacity),
            range_doppler: BoundedQueue::new("range_doppler", settings.result_queue_capacity),
            range_angle: BoundedQueue::new("range_angle", settings.result_queue_capacity),
            settings,
            selected_channel: AtomicUsize::new(0),
            metrics: PipelineMetrics::new(),
        })
    }

    pub fn config(&self) -> &Arc<RadarConfig> {
        &self.config
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn frame_length(&self) -> usize {
        self.layout.frame_length()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Selects the receiver used for display; out-of-range ids are logged and ignored.
    pub fn set_channel(&self, channel: usize) -> bool {
        let receivers = self.config.num_rx_channels();
        if channel < receivers {
            self.selected_channel.store(channel, Ordering::Release);
            info!("selected channel changed to {}", channel);
            true
        } else {
            warn!(
                "invalid channel selection {} (configured receivers: {})",
                channel, receivers
            );
            false
        }
    }

    pub fn selected_channel(&self) -> usize {
        self.selected_channel.load(Ordering::Acquire)
    }

    /// Empties every queue; used at teardown once the workers have stopped.
    pub fn drain_queues(&self) -> usize {
        self.raw_frames.drain()
            + self.range_profiles.drain()
            + self.range_doppler.drain()
            + self.range_angle.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::small_config;

    #[test]
    fn full_queue_drops_after_timeout() {
        let queue = BoundedQueue::new("test", 1);
        assert!(queue.offer(1, Duration::from_millis(10)));

        let started = Instant::now();
        assert!(!queue.offer(2, Duration::from_millis(30)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(queue.try_offer(3), Err(3));
        assert_eq!(queue.take(Duration::from_millis(10)), Some(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn set_channel_validates_against_receivers() {
        let context = PipelineContext::new(small_config(), PipelineSettings::default());
        assert!(context.set_channel(1));
        assert_eq!(context.selected_channel(), 1);
        assert!(!context.set_channel(2));
        assert_eq!(context.selected_channel(), 1);
    }

    #[test]
    fn channel_power_averages_over_chirps() {
        let mut data = Array3::<f64>::zeros((3, 2, 2));
        data[[1, 1, 0]] = 2.0;
        data[[1, 1, 1]] = 4.0;
        let frame = SpectralFrame {
            sequence: 0,
            channel: 1,
            padding: Padding::new(3, 2, 2),
            data,
        };
        assert_eq!(frame.channel_power(1), Some(vec![0.0, 10.0, 0.0]));
        assert_eq!(frame.channel_power(2), None);
    }

    #[test]
    fn drain_queues_empties_everything() {
        let context = PipelineContext::new(small_config(), PipelineSettings::default());
        context
            .raw_frames
            .try_offer(RawFrame {
                sequence: 0,
                samples: vec![0; 4],
            })
            .unwrap();
        assert_eq!(context.drain_queues(), 1);
        assert!(context.raw_frames.is_empty());
    }
}
