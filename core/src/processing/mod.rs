pub mod angle;
pub mod cfar;
pub mod doppler;
pub mod padding;
pub mod range;
pub mod stage;

pub use angle::{range_angle, AngleStage};
pub use cfar::{detect_cfar, CfarOutput, CfarParams};
pub use doppler::{range_doppler, DopplerStage};
pub use padding::suggest_padding;
pub use range::{range_profile, RangeStage};
pub use stage::{validate_cube, CubeSample, SpectralStage};
