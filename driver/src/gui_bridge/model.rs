use fmcwcore::math::StatsHelper;
use fmcwcore::pipeline::SpectralFrame;
use fmcwcore::prelude::DspResult;
use fmcwcore::processing::{detect_cfar, CfarParams};
use serde::{Deserialize, Serialize};

/// A CFAR hit on the displayed range profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub range_bin: usize,
    pub range_m: f64,
    pub level_db: f64,
}

/// Latest display state served to the external presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VisualizationModel {
    pub sequence: Option<u64>,
    pub channel: usize,
    pub range_axis_m: Vec<f64>,
    /// Chirp-averaged power relative to the profile peak.
    pub profile_db: Vec<f64>,
    pub detections: Vec<Detection>,
    pub range_doppler_frames: u64,
    pub range_angle_frames: u64,
}

impl VisualizationModel {
    /// Replaces the profile with the frame's selected channel and reruns CFAR on it.
    pub fn update_profile(
        &mut self,
        frame: &SpectralFrame,
        range_resolution_m: f64,
        cfar: &CfarParams,
    ) -> DspResult<()> {
        let power = frame.channel_power(frame.channel).unwrap_or_default();
        let amplitude: Vec<f64> = power.iter().map(|value| value.sqrt()).collect();
        let profile_db = StatsHelper::normalized_db(&power);

        self.sequence = Some(frame.sequence);
        self.channel = frame.channel;
        self.range_axis_m = (0..power.len())
            .map(|bin| bin as f64 * range_resolution_m)
            .collect();
        self.detections.clear();

        let outcome = detect_cfar(&amplitude, cfar).map(|output| {
            self.detections = output
                .indices()
                .into_iter()
                .map(|bin| Detection {
                    range_bin: bin,
                    range_m: bin as f64 * range_resolution_m,
                    level_db: profile_db[bin],
                })
                .collect();
        });
        self.profile_db = profile_db;
        outcome
    }
}
