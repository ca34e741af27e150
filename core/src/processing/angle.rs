use crate::prelude::{DspResult, OutputMode, Padding, SpectralOutput};
use crate::processing::stage::{execute, windowed_fft, AxisFft, CubeSample, SpectralStage};
use ndarray::{Array3, ArrayBase, ArrayView3, Axis, Data, Dimension};
use num_complex::Complex64;

/// Centred angle FFT across the antenna axis of each sample/chirp column.
pub struct AngleStage;

impl SpectralStage for AngleStage {
    fn name(&self) -> &'static str {
        "range_angle"
    }

    fn compute(&self, cube: ArrayView3<Complex64>, padding: Padding) -> DspResult<Array3<Complex64>> {
        Ok(windowed_fft(
            cube,
            AxisFft {
                axis: Axis(1),
                fft_len: padding.angle,
                remove_mean: false,
                centre: true,
            },
        ))
    }
}

/// Range-angle map of `cube`, shaped `[samples, angle_pad, chirps]`.
pub fn range_angle<S, D, A>(
    cube: &ArrayBase<S, D>,
    mode: OutputMode,
    padding: Option<Padding>,
) -> DspResult<SpectralOutput>
where
    S: Data<Elem = A>,
    D: Dimension,
    A: CubeSample,
{
    execute(&AngleStage, cube, mode, padding)
}
