use crate::prelude::Padding;

/// Share of an axis length that may be added to reach the next power of two.
const POWER_OF_TWO_SLACK: f64 = 0.1;
/// Range FFTs that cannot reach a power of two are rounded to this multiple.
const RANGE_ALIGNMENT: usize = 8;

/// FFT lengths for a `[samples, antennas, chirps]` cube.
///
/// Powers of two are kept. Otherwise an axis is padded to the next power of two
/// when that adds at most 10% of its length; failing that the range axis is
/// rounded up to a multiple of 8 and the other axes are left unpadded.
///
/// Only the shape decides the result, so no minimum range or doppler resolution
/// is taken; callers holding those values can drop them.
pub fn suggest_padding(shape: [usize; 3]) -> Padding {
    let [samples, antennas, chirps] = shape;
    Padding {
        range: pad_axis(samples).unwrap_or_else(|| samples.div_ceil(RANGE_ALIGNMENT) * RANGE_ALIGNMENT),
        angle: pad_axis(antennas).unwrap_or(antennas),
        doppler: pad_axis(chirps).unwrap_or(chirps),
    }
}

fn pad_axis(len: usize) -> Option<usize> {
    if len.is_power_of_two() {
        return Some(len);
    }
    let next = len.checked_next_power_of_two()?;
    if (next - len) as f64 <= len as f64 * POWER_OF_TWO_SLACK {
        Some(next)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powers_of_two_are_kept() {
        assert_eq!(suggest_padding([256, 4, 16]).as_array(), [256, 4, 16]);
    }

    #[test]
    fn near_power_of_two_is_padded_up() {
        assert_eq!(suggest_padding([250, 4, 16]).as_array(), [256, 4, 16]);
        assert_eq!(suggest_padding([256, 4, 30]).as_array(), [256, 4, 32]);
    }

    #[test]
    fn distant_range_rounds_to_multiple_of_eight() {
        assert_eq!(suggest_padding([100, 4, 16]).as_array(), [104, 4, 16]);
        assert_eq!(suggest_padding([96, 4, 16]).as_array(), [96, 4, 16]);
    }

    #[test]
    fn distant_angle_and_doppler_stay_unpadded() {
        assert_eq!(suggest_padding([256, 3, 12]).as_array(), [256, 3, 12]);
    }
}
