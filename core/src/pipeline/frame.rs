use crate::prelude::{DspError, DspResult, SampleCube};
use log::warn;
use ndarray::Array3;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Bytes of capture-card header preceding every data-channel payload.
pub const DATAGRAM_HEADER_LEN: usize = 10;

/// One complete frame of little-endian ADC values, exactly `frame_length` long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub sequence: u64,
    pub samples: Vec<i16>,
}

/// Geometry of a frame once de-interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    pub samples: usize,
    pub antennas: usize,
    pub chirps: usize,
    pub complex: bool,
}

impl FrameLayout {
    pub fn frame_length(&self) -> usize {
        let values = self.samples * self.antennas * self.chirps;
        if self.complex {
            values * 2
        } else {
            values
        }
    }

    /// De-interleaves a raw frame into a `[sample, antenna, chirp]` cube.
    ///
    /// Complex frames arrive in groups of four values `[a, b, c, d]` holding the
    /// two samples `a + jc` and `b + jd`; the sample stream is chirp-major.
    pub fn to_cube(&self, frame: &RawFrame) -> DspResult<SampleCube> {
        if frame.samples.len() != self.frame_length() {
            return Err(DspError::Validation(format!(
                "frame {} holds {} values, layout expects {}",
                frame.sequence,
                frame.samples.len(),
                self.frame_length()
            )));
        }

        let values: Vec<Complex64> = if self.complex {
            if frame.samples.len() % 4 != 0 {
                return Err(DspError::Validation(format!(
                    "complex frame length {} is not a multiple of 4",
                    frame.samples.len()
                )));
            }
            frame
                .samples
                .chunks_exact(4)
                .flat_map(|group| {
                    [
                        Complex64::new(f64::from(group[0]), f64::from(group[2])),
                        Complex64::new(f64::from(group[1]), f64::from(group[3])),
                    ]
                })
                .collect()
        } else {
            frame
                .samples
                .iter()
                .map(|&value| Complex64::new(f64::from(value), 0.0))
                .collect()
        };

        let cube = Array3::from_shape_vec((self.chirps, self.antennas, self.samples), values)
            .map_err(|err| DspError::Validation(err.to_string()))?;
        Ok(cube.permuted_axes([2, 1, 0]))
    }
}

/// Why a datagram contributed nothing to the reassembly buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramFault {
    Undersized(usize),
}

/// Reassembles arbitrary-sized datagram payloads into fixed-length frames.
pub struct FrameAssembler {
    frame_length: usize,
    buffer: Vec<i16>,
    next_sequence: u64,
}

impl FrameAssembler {
    pub fn new(frame_length: usize) -> Self {
        Self {
            frame_length: frame_length.max(1),
            buffer: Vec::with_capacity(frame_length * 2),
            next_sequence: 0,
        }
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Values waiting for the rest of their frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Strips the header, appends the payload and slices off every complete frame.
    pub fn push_datagram(&mut self, datagram: &[u8]) -> Result<Vec<RawFrame>, DatagramFault> {
        if datagram.len() <= DATAGRAM_HEADER_LEN {
            return Err(DatagramFault::Undersized(datagram.len()));
        }
        let payload = &datagram[DATAGRAM_HEADER_LEN..];
        if payload.len() % 2 != 0 {
            warn!(
                "datagram payload of {} bytes has a trailing odd byte, ignoring it",
                payload.len()
            );
        }
        self.buffer.extend(
            payload
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
        );

        let mut frames = Vec::new();
        while self.buffer.len() >= self.frame_length {
            let remainder = self.buffer.split_off(self.frame_length);
            let samples = std::mem::replace(&mut self.buffer, remainder);
            frames.push(RawFrame {
                sequence: self.next_sequence,
                samples,
            });
            self.next_sequence += 1;
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datagram(values: &[i16]) -> Vec<u8> {
        let mut bytes = vec![0xAB; DATAGRAM_HEADER_LEN];
        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn exact_multiple_yields_whole_frames() {
        let frame_length = 12;
        let stream: Vec<i16> = (0..(3 * frame_length) as i16).collect();
        let mut assembler = FrameAssembler::new(frame_length);

        let mut frames = Vec::new();
        for chunk in stream.chunks(5) {
            frames.extend(assembler.push_datagram(&datagram(chunk)).unwrap());
        }

        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|frame| frame.samples.len() == frame_length));
        assert_eq!(frames[1].sequence, 1);
        assert_eq!(frames[2].samples[0], 24);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn remainder_is_kept_for_next_frame() {
        let mut assembler = FrameAssembler::new(4);
        let frames = assembler.push_datagram(&datagram(&[1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(assembler.pending(), 2);

        let frames = assembler.push_datagram(&datagram(&[7, 8])).unwrap();
        assert_eq!(frames[0].samples, vec![5, 6, 7, 8]);
    }

    #[test]
    fn header_only_datagram_is_undersized() {
        let mut assembler = FrameAssembler::new(4);
        assert_eq!(
            assembler.push_datagram(&[0u8; DATAGRAM_HEADER_LEN]),
            Err(DatagramFault::Undersized(DATAGRAM_HEADER_LEN))
        );
    }

    #[test]
    fn complex_frame_deinterleaves_lane_pairs() {
        let layout = FrameLayout {
            samples: 2,
            antennas: 2,
            chirps: 2,
            complex: true,
        };
        let samples: Vec<i16> = (0..16).collect();
        let frame = RawFrame {
            sequence: 0,
            samples,
        };
        let cube = layout.to_cube(&frame).unwrap();
        assert_eq!(cube.dim(), (2, 2, 2));

        // stream [chirp0 rx0 s0, chirp0 rx0 s1, chirp0 rx1 s0, ...] from groups [a b c d]
        assert_eq!(cube[[0, 0, 0]], Complex64::new(0.0, 2.0));
        assert_eq!(cube[[1, 0, 0]], Complex64::new(1.0, 3.0));
        assert_eq!(cube[[0, 1, 0]], Complex64::new(4.0, 6.0));
        assert_eq!(cube[[1, 1, 1]], Complex64::new(13.0, 15.0));
    }

    #[test]
    fn real_frame_maps_values_directly() {
        let layout = FrameLayout {
            samples: 3,
            antennas: 1,
            chirps: 2,
            complex: false,
        };
        let frame = RawFrame {
            sequence: 4,
            samples: vec![1, 2, 3, 4, 5, 6],
        };
        let cube = layout.to_cube(&frame).unwrap();
        assert_eq!(cube[[2, 0, 1]], Complex64::new(6.0, 0.0));
    }

    #[test]
    fn wrong_length_frame_is_rejected() {
        let layout = FrameLayout {
            samples: 4,
            antennas: 1,
            chirps: 1,
            complex: true,
        };
        let frame = RawFrame {
            sequence: 9,
            samples: vec![0; 6],
        };
        assert!(matches!(layout.to_cube(&frame), Err(DspError::Validation(_))));
    }
}
