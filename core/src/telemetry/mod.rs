pub mod log;
pub mod metrics;

pub use self::log::{LogManager, LOG_INTERVAL};
pub use self::metrics::{MetricsSnapshot, PipelineMetrics};
