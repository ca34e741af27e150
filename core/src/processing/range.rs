use crate::prelude::{DspResult, OutputMode, Padding, SpectralOutput};
use crate::processing::stage::{execute, windowed_fft, AxisFft, CubeSample, SpectralStage};
use ndarray::{Array3, ArrayBase, ArrayView3, Axis, Data, Dimension};
use num_complex::Complex64;

/// Range FFT per antenna/chirp column with DC removal. Bin 0 is zero range.
pub struct RangeStage;

impl RangeStage {
    pub(crate) fn range_fft(cube: ArrayView3<Complex64>, fft_len: usize) -> Array3<Complex64> {
        windowed_fft(
            cube,
            AxisFft {
                axis: Axis(0),
                fft_len,
                remove_mean: true,
                centre: false,
            },
        )
    }
}

impl SpectralStage for RangeStage {
    fn name(&self) -> &'static str {
        "range_profile"
    }

    fn compute(&self, cube: ArrayView3<Complex64>, padding: Padding) -> DspResult<Array3<Complex64>> {
        Ok(Self::range_fft(cube, padding.range))
    }
}

/// Range profile of `cube`, shaped `[range_pad, antennas, chirps]`.
pub fn range_profile<S, D, A>(
    cube: &ArrayBase<S, D>,
    mode: OutputMode,
    padding: Option<Padding>,
) -> DspResult<SpectralOutput>
where
    S: Data<Elem = A>,
    D: Dimension,
    A: CubeSample,
{
    execute(&RangeStage, cube, mode, padding)
}
