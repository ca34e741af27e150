//! Real-time acquisition: datagram reassembly, worker threads and the queues between them.

pub mod context;
pub mod frame;
pub mod ingest;
pub mod task;
pub mod transform;

pub use context::{BoundedQueue, PipelineContext, PipelineSettings, SpectralFrame};
pub use frame::{DatagramFault, FrameAssembler, FrameLayout, RawFrame, DATAGRAM_HEADER_LEN};
pub use ingest::FrameIngestor;
pub use task::{StopSignal, WorkerHandle};
pub use transform::{FrameResults, FrameTransformer};

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::RadarConfig;

    /// Two receivers, one transmitter, 8 complex samples and 4 chirps: 128 values per frame.
    pub const SMALL_CFG: &str = "\
channelCfg 3 1 0
adcCfg 2 1
adcbufCfg -1 0 1 1 1
profileCfg 0 77 7 3 39 0 0 100 1 8 7200 0 0 30
chirpCfg 0 0 0 0 0 0 0 1
frameCfg 0 0 4 0 100 1 0
";

    pub fn small_config() -> RadarConfig {
        SMALL_CFG.parse().expect("small radar config")
    }
}
