use log::{debug, info};

/// Frames between periodic progress lines.
pub const LOG_INTERVAL: u64 = 100;

/// Per-worker logger that reports progress every `interval` frames.
pub struct LogManager {
    worker: &'static str,
    interval: u64,
}

impl LogManager {
    pub fn new(worker: &'static str) -> Self {
        Self::with_interval(worker, LOG_INTERVAL)
    }

    pub fn with_interval(worker: &'static str, interval: u64) -> Self {
        Self {
            worker,
            interval: interval.max(1),
        }
    }

    /// Returns true when `count` landed on a reporting boundary.
    pub fn progress(&self, count: u64) -> bool {
        let due = count > 0 && count % self.interval == 0;
        if due {
            debug!("{}: processed {} frames", self.worker, count);
        }
        due
    }

    pub fn record(&self, message: &str) {
        info!("{}: {}", self.worker, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_fires_on_interval_boundaries() {
        let logger = LogManager::with_interval("test", 3);
        let fired: Vec<u64> = (0..10).filter(|&count| logger.progress(count)).collect();
        assert_eq!(fired, vec![3, 6, 9]);
    }
}
