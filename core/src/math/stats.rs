use num_complex::Complex64;

/// Guards logarithms and ratios against zero-valued inputs.
pub const EPSILON: f64 = 1e-10;

pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    pub fn complex_mean<'a, I>(samples: I) -> Complex64
    where
        I: IntoIterator<Item = &'a Complex64>,
    {
        let (sum, count) = samples
            .into_iter()
            .fold((Complex64::new(0.0, 0.0), 0usize), |(sum, count), value| {
                (sum + *value, count + 1)
            });
        if count == 0 {
            sum
        } else {
            sum / count as f64
        }
    }

    /// Mean after sorting and discarding `trim` values from each end.
    pub fn trimmed_mean(samples: &mut [f64], trim: usize) -> f64 {
        samples.sort_by(|a, b| a.total_cmp(b));
        let end = samples.len().saturating_sub(trim);
        if trim >= end {
            return Self::mean(samples);
        }
        Self::mean(&samples[trim..end])
    }

    /// Powers in dB relative to their peak; an all-zero input stays finite.
    pub fn normalized_db(powers: &[f64]) -> Vec<f64> {
        let peak = powers.iter().copied().fold(0.0_f64, f64::max).max(EPSILON);
        powers
            .iter()
            .map(|&power| 10.0 * (power / peak + EPSILON).log10())
            .collect()
    }
}
