use fmcwcore::pipeline::FrameLayout;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A point reflector placed on the cube grid, positions given in FFT bins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    pub range_bin: f64,
    pub angle_bin: f64,
    pub doppler_bin: f64,
    pub amplitude: f64,
}

impl Tone {
    /// In-phase and quadrature value of this reflector at one cube cell.
    pub fn sample(&self, layout: &FrameLayout, sample: usize, antenna: usize, chirp: usize) -> (f64, f64) {
        let cycles = self.range_bin * sample as f64 / layout.samples as f64
            + self.angle_bin * antenna as f64 / layout.antennas as f64
            + self.doppler_bin * chirp as f64 / layout.chirps as f64;
        let phase = 2.0 * PI * cycles;
        (self.amplitude * phase.cos(), self.amplitude * phase.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_advances_one_cycle_across_the_range_axis() {
        let layout = FrameLayout {
            samples: 8,
            antennas: 1,
            chirps: 1,
            complex: true,
        };
        let tone = Tone {
            range_bin: 1.0,
            angle_bin: 0.0,
            doppler_bin: 0.0,
            amplitude: 2.0,
        };
        let (i0, q0) = tone.sample(&layout, 0, 0, 0);
        let (i2, q2) = tone.sample(&layout, 2, 0, 0);
        assert!((i0 - 2.0).abs() < 1e-12 && q0.abs() < 1e-12);
        assert!(i2.abs() < 1e-12 && (q2 - 2.0).abs() < 1e-12);
    }
}
