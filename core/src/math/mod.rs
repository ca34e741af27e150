pub mod fft;
pub mod stats;
pub mod window;

pub use fft::{fft_shift, FftHelper};
pub use stats::StatsHelper;
pub use window::{create_window, WindowCache};
