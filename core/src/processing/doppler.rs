use crate::math::fft_shift;
use crate::prelude::{DspResult, OutputMode, Padding, SpectralOutput};
use crate::processing::range::RangeStage;
use crate::processing::stage::{
    execute, magnitude, windowed_fft, AxisFft, CubeSample, SpectralStage,
};
use ndarray::{aview1, s, Array3, ArrayBase, ArrayView3, Axis, Data, Dimension};
use num_complex::Complex64;

/// Range FFT followed by a centred doppler FFT along the chirp axis.
///
/// Two presentations exist. `Magnitude` returns `[range, antenna, doppler]` with
/// the range axis reversed. `Both` pairs the raw spectrum with a magnitude that is
/// shifted again along doppler, transposed to `[range, doppler, antenna]` and
/// range-reversed. Display consumers key off both layouts.
pub struct DopplerStage;

impl SpectralStage for DopplerStage {
    fn name(&self) -> &'static str {
        "range_doppler"
    }

    fn compute(&self, cube: ArrayView3<Complex64>, padding: Padding) -> DspResult<Array3<Complex64>> {
        let range_spectrum = RangeStage::range_fft(cube, padding.range);
        Ok(windowed_fft(
            range_spectrum.view(),
            AxisFft {
                axis: Axis(2),
                fft_len: padding.doppler,
                remove_mean: false,
                centre: true,
            },
        ))
    }

    fn present(&self, spectrum: Array3<Complex64>, mode: OutputMode) -> SpectralOutput {
        match mode {
            OutputMode::Complex => SpectralOutput::Complex(spectrum),
            OutputMode::Magnitude => {
                let magnitude = magnitude(&spectrum);
                SpectralOutput::Magnitude(magnitude.slice(s![..;-1, .., ..]).to_owned())
            }
            OutputMode::Both => {
                let mut centred = magnitude(&spectrum);
                for mut lane in centred.lanes_mut(Axis(2)) {
                    let mut values = lane.to_vec();
                    fft_shift(&mut values);
                    lane.assign(&aview1(&values));
                }
                let presented = centred
                    .permuted_axes([0, 2, 1])
                    .slice(s![..;-1, .., ..])
                    .to_owned();
                SpectralOutput::Both {
                    complex: spectrum,
                    magnitude: presented,
                }
            }
        }
    }
}

/// Range-doppler map of `cube`; see [`DopplerStage`] for the output layouts.
pub fn range_doppler<S, D, A>(
    cube: &ArrayBase<S, D>,
    mode: OutputMode,
    padding: Option<Padding>,
) -> DspResult<SpectralOutput>
where
    S: Data<Elem = A>,
    D: Dimension,
    A: CubeSample,
{
    execute(&DopplerStage, cube, mode, padding)
}
