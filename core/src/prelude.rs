use ndarray::Array3;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Complex radar cube laid out as `[range-sample, antenna, chirp]`.
pub type SampleCube = Array3<Complex64>;

/// FFT lengths applied per cube axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Padding {
    pub range: usize,
    pub angle: usize,
    pub doppler: usize,
}

impl Padding {
    pub fn new(range: usize, angle: usize, doppler: usize) -> Self {
        Self {
            range,
            angle,
            doppler,
        }
    }

    /// `[range, angle, doppler]`, matching the cube axis order.
    pub fn as_array(&self) -> [usize; 3] {
        [self.range, self.angle, self.doppler]
    }
}

/// Shape of the value returned by a spectral transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    Complex,
    Magnitude,
    Both,
}

impl TryFrom<u8> for OutputMode {
    type Error = DspError;

    fn try_from(mode: u8) -> Result<Self, Self::Error> {
        match mode {
            0 => Ok(OutputMode::Complex),
            1 => Ok(OutputMode::Magnitude),
            2 => Ok(OutputMode::Both),
            other => Err(DspError::Validation(format!("invalid output mode {}", other))),
        }
    }
}

/// Spectrum produced by one of the transforms.
#[derive(Debug, Clone)]
pub enum SpectralOutput {
    Complex(Array3<Complex64>),
    Magnitude(Array3<f64>),
    Both {
        complex: Array3<Complex64>,
        magnitude: Array3<f64>,
    },
}

impl SpectralOutput {
    pub fn complex(&self) -> Option<&Array3<Complex64>> {
        match self {
            SpectralOutput::Complex(complex) | SpectralOutput::Both { complex, .. } => {
                Some(complex)
            }
            SpectralOutput::Magnitude(_) => None,
        }
    }

    pub fn magnitude(&self) -> Option<&Array3<f64>> {
        match self {
            SpectralOutput::Magnitude(magnitude) | SpectralOutput::Both { magnitude, .. } => {
                Some(magnitude)
            }
            SpectralOutput::Complex(_) => None,
        }
    }

    pub fn into_magnitude(self) -> Option<Array3<f64>> {
        match self {
            SpectralOutput::Magnitude(magnitude) | SpectralOutput::Both { magnitude, .. } => {
                Some(magnitude)
            }
            SpectralOutput::Complex(_) => None,
        }
    }
}

/// Errors raised by the signal-processing engine.
#[derive(thiserror::Error, Debug)]
pub enum DspError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("transform failed: {0}")]
    Transform(String),
}

pub type DspResult<T> = Result<T, DspError>;

/// Errors raised while loading a radar configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigParseError {
    #[error("reading radar config: {0}")]
    Io(#[from] std::io::Error),
    #[error("required directive `{0}` is missing")]
    MissingDirective(&'static str),
    #[error("line {line}: `{directive}` is missing field `{field}`")]
    MissingField {
        line: usize,
        directive: &'static str,
        field: &'static str,
    },
    #[error("line {line}: `{directive}` field `{field}` has invalid value `{value}`")]
    InvalidField {
        line: usize,
        directive: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("chirp range {start}..={end} yields no chirps per frame")]
    EmptyChirpRange { start: i64, end: i64 },
}

/// Errors raised by the capture-card control channel.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("binding control socket {addr}: {source}")]
    SocketBind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("control channel i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("no acknowledgement for {0} before timeout")]
    ProtocolTimeout(&'static str),
    #[error("malformed command packet: {0}")]
    MalformedPacket(String),
}

/// Failure reported by the sensor-control capability.
#[derive(thiserror::Error, Debug)]
#[error("sensor control `{operation}` failed: {message}")]
pub struct SensorError {
    pub operation: &'static str,
    pub message: String,
}

/// Errors raised while starting or running pipeline workers.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("binding data socket {addr}: {source}")]
    SocketBind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("spawning worker {name}: {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },
    #[error("worker {0} already running")]
    AlreadyRunning(&'static str),
    #[error("frame {sequence}: {source}")]
    Transform { sequence: u64, source: DspError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_mode_accepts_known_codes_only() {
        assert_eq!(OutputMode::try_from(0).unwrap(), OutputMode::Complex);
        assert_eq!(OutputMode::try_from(2).unwrap(), OutputMode::Both);
        assert!(matches!(
            OutputMode::try_from(3),
            Err(DspError::Validation(_))
        ));
    }
}
