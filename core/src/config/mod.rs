//! Radar configuration text (`.cfg`) and the physical quantities derived from it.

pub mod directives;
pub mod parameters;

pub use directives::{
    AdcBufCfg, AdcCfg, ChannelCfg, ChirpCfg, FrameCfg, GuiMonitorCfg, LowPowerCfg, ProfileCfg,
    RadarConfig,
};
pub use parameters::{RadarParameters, SPEED_OF_LIGHT};
