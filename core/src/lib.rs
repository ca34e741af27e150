//! Core acquisition and signal-processing library for FMCW radar streams.
//!
//! Raw ADC datagrams are reassembled into frames, reshaped into
//! `[sample, antenna, chirp]` cubes and turned into range, range-doppler and
//! range-angle views by worker threads joined through bounded queues. The
//! capture card is driven over its binary control protocol.

pub mod capture;
pub mod config;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use config::{RadarConfig, RadarParameters};
pub use pipeline::{FrameIngestor, FrameTransformer, PipelineContext, PipelineSettings};
pub use prelude::{OutputMode, Padding, SpectralOutput};
