use crate::math::stats::{StatsHelper, EPSILON};
use crate::prelude::{DspError, DspResult};
use log::error;
use serde::{Deserialize, Serialize};

/// Training cells discarded from each end of the sorted noise window.
const TRIM: usize = 2;

/// Tuning for [`detect_cfar`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfarParams {
    /// Training cells on each side of the cell under test.
    pub num_train: usize,
    /// Guard cells on each side of the cell under test.
    pub num_guard: usize,
    /// Probability of false alarm.
    pub pfa: f64,
    /// Optional absolute floor (dB, amplitude); cells below it are never detections.
    pub min_signal_db: Option<f64>,
    /// Empirical scaling applied to the cell-averaging threshold factor.
    pub threshold_scale: f64,
    /// Detections at most this many cells apart are merged.
    pub merge_gap: usize,
}

impl Default for CfarParams {
    fn default() -> Self {
        Self {
            num_train: 8,
            num_guard: 2,
            pfa: 1e-3,
            min_signal_db: None,
            threshold_scale: 0.25,
            merge_gap: 2,
        }
    }
}

impl CfarParams {
    fn margin(&self) -> usize {
        self.num_train + self.num_guard
    }

    fn above_floor(&self, value: f64) -> bool {
        self.min_signal_db
            .map_or(true, |floor| 20.0 * (value + EPSILON).log10() >= floor)
    }

    /// `num_train * (pfa^(-1/num_train) - 1) * threshold_scale`
    pub fn base_threshold_factor(&self) -> f64 {
        let train = self.num_train as f64;
        train * (self.pfa.powf(-1.0 / train) - 1.0) * self.threshold_scale
    }

    fn validate(&self, signal_len: usize) -> DspResult<()> {
        if self.num_train * 2 <= TRIM * 2 {
            return Err(DspError::Validation(format!(
                "num_train {} leaves no training cells after trimming",
                self.num_train
            )));
        }
        if !(self.pfa > 0.0 && self.pfa < 1.0) {
            return Err(DspError::Validation(format!(
                "pfa {} outside (0, 1)",
                self.pfa
            )));
        }
        if signal_len <= 2 * self.margin() {
            return Err(DspError::Validation(format!(
                "signal length {} must exceed window span {}",
                signal_len,
                2 * self.margin()
            )));
        }
        Ok(())
    }
}

/// Per-cell detection flags and adaptive thresholds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfarOutput {
    pub detections: Vec<bool>,
    pub thresholds: Vec<f64>,
}

impl CfarOutput {
    pub fn indices(&self) -> Vec<usize> {
        self.detections
            .iter()
            .enumerate()
            .filter_map(|(index, &hit)| hit.then_some(index))
            .collect()
    }
}

/// Trimmed cell-averaging CFAR over a one-dimensional magnitude signal.
///
/// Thresholds stay zero for the `num_train + num_guard` edge cells on each side.
pub fn detect_cfar(signal: &[f64], params: &CfarParams) -> DspResult<CfarOutput> {
    if let Err(err) = params.validate(signal.len()) {
        error!("Error in detect_cfar: {}", err);
        return Err(err);
    }

    let len = signal.len();
    let margin = params.margin();
    let width = 2 * margin + 1;
    let padded = reflect_pad(signal, margin);
    let base = params.base_threshold_factor();

    let mut detections = vec![false; len];
    let mut thresholds = vec![0.0; len];
    let mut training = Vec::with_capacity(2 * params.num_train);

    for centre in margin..len - margin {
        let window = &padded[centre..centre + width];
        training.clear();
        training.extend_from_slice(&window[..params.num_train]);
        training.extend_from_slice(&window[width - params.num_train..]);

        let noise = StatsHelper::trimmed_mean(&mut training, TRIM);
        let value = signal[centre];
        let local_snr = value / (noise + EPSILON);
        let threshold = base * (1.0 + 0.1 * (local_snr + 1.0).log10()) * noise;

        thresholds[centre] = threshold;
        detections[centre] = value > threshold && params.above_floor(value);
    }

    merge_adjacent(&mut detections, params.merge_gap);
    Ok(CfarOutput {
        detections,
        thresholds,
    })
}

/// Mirrors `margin` cells at each end, excluding the edge sample itself.
fn reflect_pad(signal: &[f64], margin: usize) -> Vec<f64> {
    let len = signal.len();
    let mut padded = Vec::with_capacity(len + 2 * margin);
    padded.extend((1..=margin).rev().map(|offset| signal[offset]));
    padded.extend_from_slice(signal);
    padded.extend((1..=margin).map(|offset| signal[len - 1 - offset]));
    padded
}

/// Left-to-right scan collapsing close detection pairs onto their midpoint.
fn merge_adjacent(detections: &mut [bool], max_gap: usize) {
    let indices: Vec<usize> = detections
        .iter()
        .enumerate()
        .filter_map(|(index, &hit)| hit.then_some(index))
        .collect();

    for pair in indices.windows(2) {
        let gap = pair[1] - pair[0];
        if gap <= max_gap {
            detections[pair[0]..=pair[1]].fill(false);
            detections[pair[0] + gap / 2] = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_with_spikes(len: usize, floor: f64, spikes: &[usize]) -> Vec<f64> {
        let mut signal = vec![floor; len];
        for &index in spikes {
            signal[index] = floor * 1000.0;
        }
        signal
    }

    #[test]
    fn single_spike_yields_one_detection() {
        let signal = floor_with_spikes(64, 1.0, &[30]);
        let output = detect_cfar(&signal, &CfarParams::default()).unwrap();
        assert_eq!(output.indices(), vec![30]);
        assert!(output.thresholds[30] < signal[30]);
    }

    #[test]
    fn low_amplitude_spike_is_detected() {
        let mut signal = vec![1e-4; 64];
        signal[30] = 1e-4 * 10f64.powf(1.5);
        let output = detect_cfar(&signal, &CfarParams::default()).unwrap();
        assert_eq!(output.indices(), vec![30]);
    }

    #[test]
    fn opt_in_floor_rejects_weak_cells() {
        let signal = floor_with_spikes(64, 1e-4, &[30]);
        let floored = CfarParams {
            min_signal_db: Some(-10.0),
            ..Default::default()
        };
        assert!(detect_cfar(&signal, &floored).unwrap().indices().is_empty());

        let loose = CfarParams {
            min_signal_db: Some(-60.0),
            ..Default::default()
        };
        assert_eq!(detect_cfar(&signal, &loose).unwrap().indices(), vec![30]);
    }

    #[test]
    fn thresholds_scale_with_noise_floor() {
        let params = CfarParams::default();
        let quiet = detect_cfar(&floor_with_spikes(64, 1.0, &[30]), &params).unwrap();
        let loud = detect_cfar(&floor_with_spikes(64, 4.0, &[30]), &params).unwrap();

        let expected = params.base_threshold_factor() * (1.0 + 0.1 * 2.0_f64.log10());
        assert!((quiet.thresholds[15] - expected).abs() < 1e-6);
        for index in 10..54 {
            assert!((loud.thresholds[index] - 4.0 * quiet.thresholds[index]).abs() < 1e-6);
        }
    }

    #[test]
    fn edge_cells_have_zero_threshold() {
        let signal = floor_with_spikes(40, 1.0, &[]);
        let output = detect_cfar(&signal, &CfarParams::default()).unwrap();
        assert!(output.thresholds[..10].iter().all(|&value| value == 0.0));
        assert!(output.thresholds[30..].iter().all(|&value| value == 0.0));
        assert!(output.thresholds[10..30].iter().all(|&value| value > 0.0));
        assert!(output.indices().is_empty());
    }

    #[test]
    fn close_spikes_merge_at_midpoint() {
        let signal = floor_with_spikes(64, 1.0, &[30, 32]);
        let output = detect_cfar(&signal, &CfarParams::default()).unwrap();
        assert_eq!(output.indices(), vec![31]);
    }

    #[test]
    fn merge_gap_is_configurable() {
        let signal = floor_with_spikes(64, 1.0, &[30, 33]);
        let default = detect_cfar(&signal, &CfarParams::default()).unwrap();
        assert_eq!(default.indices(), vec![30, 33]);

        let wide = CfarParams {
            merge_gap: 3,
            ..Default::default()
        };
        assert_eq!(detect_cfar(&signal, &wide).unwrap().indices(), vec![31]);
    }

    #[test]
    fn short_signal_is_rejected() {
        let signal = vec![1.0; 20];
        assert!(matches!(
            detect_cfar(&signal, &CfarParams::default()),
            Err(DspError::Validation(_))
        ));
    }

    #[test]
    fn reflect_pad_mirrors_without_edge() {
        let padded = reflect_pad(&[0.0, 1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(padded, vec![2.0, 1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0]);
    }
}
