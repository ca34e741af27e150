use crate::generator::template::Tone;
use anyhow::ensure;
use fmcwcore::pipeline::{FrameLayout, DATAGRAM_HEADER_LEN};
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

/// Int16 values per datagram sent by the capture card.
pub const DATAGRAM_VALUES: usize = 728;

/// Configuration for generating synthetic ADC frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub tones: Vec<Tone>,
    /// Uniform noise amplitude added to every component.
    pub noise: f64,
    pub seed: u64,
    pub frame_period_ms: u64,
    pub datagram_values: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tones: vec![Tone {
                range_bin: 24.0,
                angle_bin: 1.0,
                doppler_bin: 3.0,
                amplitude: 2000.0,
            }],
            noise: 20.0,
            seed: 0,
            frame_period_ms: 100,
            datagram_values: DATAGRAM_VALUES,
        }
    }
}

pub fn check_layout(layout: &FrameLayout) -> anyhow::Result<()> {
    ensure!(
        layout.samples > 0 && layout.antennas > 0 && layout.chirps > 0,
        "frame layout {:?} has an empty axis",
        layout
    );
    ensure!(
        !layout.complex || (layout.samples * layout.antennas * layout.chirps) % 2 == 0,
        "complex frames need an even number of samples, layout {:?}",
        layout
    );
    Ok(())
}

fn quantize(value: f64) -> i16 {
    value.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Builds one frame in capture-card order: chirp-major, and for complex output
/// each pair of samples packed as `[re0, re1, im0, im1]`.
pub fn build_frame(layout: &FrameLayout, config: &GeneratorConfig, rng: &mut StdRng) -> anyhow::Result<Vec<i16>> {
    check_layout(layout)?;
    let mut cells = Vec::with_capacity(layout.samples * layout.antennas * layout.chirps);
    for chirp in 0..layout.chirps {
        for antenna in 0..layout.antennas {
            for sample in 0..layout.samples {
                let (mut re, mut im) = config.tones.iter().fold((0.0, 0.0), |(re, im), tone| {
                    let (i, q) = tone.sample(layout, sample, antenna, chirp);
                    (re + i, im + q)
                });
                if config.noise > 0.0 {
                    re += rng.gen_range(-config.noise..config.noise);
                    im += rng.gen_range(-config.noise..config.noise);
                }
                cells.push((re, im));
            }
        }
    }

    let values = if layout.complex {
        cells
            .chunks_exact(2)
            .flat_map(|pair| {
                [
                    quantize(pair[0].0),
                    quantize(pair[1].0),
                    quantize(pair[0].1),
                    quantize(pair[1].1),
                ]
            })
            .collect()
    } else {
        cells.iter().map(|&(re, _)| quantize(re)).collect()
    };
    Ok(values)
}

/// Splits frames into datagrams carrying the capture card's 10-byte header:
/// a little-endian u32 sequence number and a 48-bit count of bytes sent before.
pub struct Packetizer {
    sequence: u32,
    byte_count: u64,
    datagram_values: usize,
}

impl Packetizer {
    pub fn new(datagram_values: usize) -> Self {
        Self {
            sequence: 1,
            byte_count: 0,
            datagram_values: datagram_values.max(1),
        }
    }

    pub fn packetize(&mut self, values: &[i16]) -> Vec<Vec<u8>> {
        values
            .chunks(self.datagram_values)
            .map(|chunk| {
                let mut datagram = Vec::with_capacity(DATAGRAM_HEADER_LEN + chunk.len() * 2);
                datagram.extend_from_slice(&self.sequence.to_le_bytes());
                datagram.extend_from_slice(&self.byte_count.to_le_bytes()[..6]);
                for value in chunk {
                    datagram.extend_from_slice(&value.to_le_bytes());
                }
                self.sequence = self.sequence.wrapping_add(1);
                self.byte_count += (chunk.len() * 2) as u64;
                datagram
            })
            .collect()
    }
}
