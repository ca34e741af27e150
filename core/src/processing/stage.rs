use crate::math::{create_window, fft_shift, FftHelper};
use crate::prelude::{DspError, DspResult, OutputMode, Padding, SpectralOutput};
use crate::processing::padding::suggest_padding;
use log::error;
use ndarray::{aview1, Array3, ArrayBase, ArrayView3, Axis, Data, Dimension, Ix3, Zip};
use num_complex::{Complex32, Complex64};

/// Element types a spectral transform accepts: real or complex floating point.
pub trait CubeSample: Copy {
    fn to_complex(self) -> Complex64;
}

impl CubeSample for f32 {
    fn to_complex(self) -> Complex64 {
        Complex64::new(f64::from(self), 0.0)
    }
}

impl CubeSample for f64 {
    fn to_complex(self) -> Complex64 {
        Complex64::new(self, 0.0)
    }
}

impl CubeSample for Complex32 {
    fn to_complex(self) -> Complex64 {
        Complex64::new(f64::from(self.re), f64::from(self.im))
    }
}

impl CubeSample for Complex64 {
    fn to_complex(self) -> Complex64 {
        self
    }
}

/// One of the windowed-FFT views computed from a `[sample, antenna, chirp]` cube.
pub trait SpectralStage {
    fn name(&self) -> &'static str;

    /// Complex spectrum for a validated cube and resolved padding.
    fn compute(&self, cube: ArrayView3<Complex64>, padding: Padding) -> DspResult<Array3<Complex64>>;

    /// Shapes the complex spectrum into the requested output.
    fn present(&self, spectrum: Array3<Complex64>, mode: OutputMode) -> SpectralOutput {
        match mode {
            OutputMode::Complex => SpectralOutput::Complex(spectrum),
            OutputMode::Magnitude => SpectralOutput::Magnitude(magnitude(&spectrum)),
            OutputMode::Both => {
                let magnitude = magnitude(&spectrum);
                SpectralOutput::Both {
                    complex: spectrum,
                    magnitude,
                }
            }
        }
    }
}

/// Validates `cube`, resolves padding and runs `stage`, logging any failure.
pub fn execute<T, S, D, A>(
    stage: &T,
    cube: &ArrayBase<S, D>,
    mode: OutputMode,
    padding: Option<Padding>,
) -> DspResult<SpectralOutput>
where
    T: SpectralStage,
    S: Data<Elem = A>,
    D: Dimension,
    A: CubeSample,
{
    let result = validate_cube(cube).and_then(|cube| {
        let (samples, antennas, chirps) = cube.dim();
        let padding = padding.unwrap_or_else(|| suggest_padding([samples, antennas, chirps]));
        if padding.as_array().contains(&0) {
            return Err(DspError::Validation(format!(
                "padding {:?} contains a zero-length axis",
                padding.as_array()
            )));
        }
        let spectrum = stage.compute(cube.view(), padding)?;
        Ok(stage.present(spectrum, mode))
    });

    if let Err(err) = &result {
        error!("Error in {}: {}", stage.name(), err);
    }
    result
}

/// Converts a real or complex array into a complex cube, rejecting anything not 3-axis.
pub fn validate_cube<S, D, A>(cube: &ArrayBase<S, D>) -> DspResult<Array3<Complex64>>
where
    S: Data<Elem = A>,
    D: Dimension,
    A: CubeSample,
{
    if cube.ndim() != 3 {
        return Err(DspError::Validation(format!(
            "input must be a 3-axis cube [samples, antennas, chirps], got {} axes",
            cube.ndim()
        )));
    }
    if cube.shape().contains(&0) {
        return Err(DspError::Validation(format!(
            "input cube {:?} has an empty axis",
            cube.shape()
        )));
    }
    let view = cube
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|err| DspError::Validation(err.to_string()))?;
    Ok(view.mapv(A::to_complex))
}

pub(crate) fn magnitude(spectrum: &Array3<Complex64>) -> Array3<f64> {
    spectrum.mapv(|value| value.norm())
}

/// Options for one windowed FFT pass along a cube axis.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AxisFft {
    pub axis: Axis,
    pub fft_len: usize,
    pub remove_mean: bool,
    pub centre: bool,
}

/// Applies a Blackman window and FFT to every lane of `input` along `options.axis`.
pub(crate) fn windowed_fft(input: ArrayView3<Complex64>, options: AxisFft) -> Array3<Complex64> {
    let window = create_window(input.len_of(options.axis));
    let fft = FftHelper::new(options.fft_len);

    let mut shape = input.raw_dim();
    shape[options.axis.index()] = options.fft_len;
    let mut output = Array3::<Complex64>::zeros(shape);

    Zip::from(input.lanes(options.axis))
        .and(output.lanes_mut(options.axis))
        .for_each(|lane, mut target| {
            let offset = if options.remove_mean {
                crate::math::StatsHelper::complex_mean(lane.iter())
            } else {
                Complex64::new(0.0, 0.0)
            };
            let windowed: Vec<Complex64> = lane
                .iter()
                .zip(window.iter())
                .map(|(&value, &weight)| (value - offset) * weight)
                .collect();
            let mut spectrum = fft.forward(&windowed);
            if options.centre {
                fft_shift(&mut spectrum);
            }
            target.assign(&aview1(&spectrum));
        });

    output
}
