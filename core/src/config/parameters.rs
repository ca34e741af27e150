use crate::config::RadarConfig;
use crate::pipeline::frame::FrameLayout;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Speed of light in m/s.
pub const SPEED_OF_LIGHT: f64 = 3e8;

impl RadarConfig {
    /// `chirpEndIdx - chirpStartIdx + 1`, at least 1 by construction.
    pub fn chirps_per_frame(&self) -> usize {
        (self.frame.chirp_end_idx - self.frame.chirp_start_idx) as usize + 1
    }

    pub fn num_loops(&self) -> usize {
        self.frame.num_loops as usize
    }

    pub fn num_tx_channels(&self) -> usize {
        self.channel.tx_mask.count_ones() as usize
    }

    pub fn num_rx_channels(&self) -> usize {
        self.channel.rx_mask.count_ones() as usize
    }

    /// ADC buffer format 0 (the default) is complex.
    pub fn is_complex_output(&self) -> bool {
        self.adc_buffer
            .map_or(true, |buffer| buffer.output_format == 0)
    }

    /// Idle plus ramp-end time of one chirp, in microseconds.
    fn chirp_cycle_us(&self) -> f64 {
        self.profile.idle_time_us + self.profile.ramp_end_time_us
    }

    pub fn adc_sampling_time_us(&self) -> f64 {
        if self.profile.sample_rate_ksps == 0.0 {
            return 0.0;
        }
        self.profile.adc_samples as f64 / self.profile.sample_rate_ksps * 1000.0
    }

    pub fn inter_chirp_time_us(&self) -> f64 {
        self.profile.idle_time_us + (self.profile.ramp_end_time_us - self.adc_sampling_time_us())
    }

    pub fn active_frame_time_ms(&self) -> f64 {
        self.chirps_per_frame() as f64 * self.chirp_cycle_us() * self.num_loops() as f64 / 1000.0
    }

    pub fn frame_time_ms(&self) -> f64 {
        self.frame.frame_period_ms
    }

    pub fn duty_cycle_pct(&self) -> f64 {
        if self.frame_time_ms() == 0.0 {
            return 0.0;
        }
        self.active_frame_time_ms() / self.frame_time_ms() * 100.0
    }

    pub fn total_bandwidth_mhz(&self) -> f64 {
        self.profile.ramp_end_time_us * self.profile.freq_slope_mhz_per_us
    }

    pub fn valid_bandwidth_mhz(&self) -> f64 {
        self.adc_sampling_time_us() * self.profile.freq_slope_mhz_per_us
    }

    pub fn range_resolution_m(&self) -> f64 {
        let bandwidth = self.valid_bandwidth_mhz();
        if bandwidth == 0.0 {
            return 0.0;
        }
        SPEED_OF_LIGHT / (2.0 * bandwidth * 1e6)
    }

    /// `0.8 * fs[ksps] * 1000 * c / (2 * slope[MHz/us] * 1e6)`
    pub fn max_range_m(&self) -> f64 {
        if self.profile.freq_slope_mhz_per_us == 0.0 {
            return 0.0;
        }
        0.8 * self.profile.sample_rate_ksps * 1000.0 * SPEED_OF_LIGHT
            / (2.0 * self.profile.freq_slope_mhz_per_us * 1e6)
    }

    pub fn wavelength_m(&self) -> f64 {
        if self.profile.start_freq_ghz == 0.0 {
            return 0.0;
        }
        SPEED_OF_LIGHT / (self.profile.start_freq_ghz * 1e9)
    }

    pub fn velocity_resolution_mps(&self) -> f64 {
        let denom = 2.0
            * self.num_loops() as f64
            * self.num_tx_channels() as f64
            * self.chirp_cycle_us()
            * 1e-6;
        if denom == 0.0 {
            return 0.0;
        }
        self.wavelength_m() / denom
    }

    pub fn max_velocity_mps(&self) -> f64 {
        let denom = 4.0 * self.num_tx_channels() as f64 * self.chirp_cycle_us() * 1e-6;
        if denom == 0.0 {
            return 0.0;
        }
        self.wavelength_m() / denom
    }

    pub fn num_range_bins(&self) -> usize {
        self.profile.adc_samples.next_power_of_two()
    }

    pub fn num_doppler_bins(&self) -> usize {
        self.num_loops().next_power_of_two()
    }

    pub fn radar_cube_size_kb(&self) -> f64 {
        self.frame_length() as f64 / 1024.0
    }

    /// Signed 16-bit values making up one frame on the data channel.
    pub fn frame_length(&self) -> usize {
        let multiplier = if self.is_complex_output() { 2 } else { 1 };
        multiplier
            * self.profile.adc_samples
            * self.chirps_per_frame()
            * self.num_loops()
            * self.num_rx_channels()
    }

    /// Cube geometry of the frames this configuration produces.
    pub fn frame_layout(&self) -> FrameLayout {
        FrameLayout {
            samples: self.profile.adc_samples,
            antennas: self.num_rx_channels(),
            chirps: self.chirps_per_frame() * self.num_loops(),
            complex: self.is_complex_output(),
        }
    }

    /// Snapshot of every derived quantity, for display.
    pub fn parameters(&self) -> RadarParameters {
        RadarParameters {
            num_tx_channels: self.num_tx_channels(),
            num_rx_channels: self.num_rx_channels(),
            chirps_per_frame: self.chirps_per_frame(),
            adc_sampling_time_us: self.adc_sampling_time_us(),
            inter_chirp_time_us: self.inter_chirp_time_us(),
            active_frame_time_ms: self.active_frame_time_ms(),
            frame_time_ms: self.frame_time_ms(),
            duty_cycle_pct: self.duty_cycle_pct(),
            total_bandwidth_mhz: self.total_bandwidth_mhz(),
            valid_bandwidth_mhz: self.valid_bandwidth_mhz(),
            range_resolution_m: self.range_resolution_m(),
            max_range_m: self.max_range_m(),
            wavelength_m: self.wavelength_m(),
            velocity_resolution_mps: self.velocity_resolution_mps(),
            max_velocity_mps: self.max_velocity_mps(),
            num_range_bins: self.num_range_bins(),
            num_doppler_bins: self.num_doppler_bins(),
            radar_cube_size_kb: self.radar_cube_size_kb(),
            frame_length: self.frame_length(),
        }
    }
}

/// Derived quantities of a [`RadarConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarParameters {
    pub num_tx_channels: usize,
    pub num_rx_channels: usize,
    pub chirps_per_frame: usize,
    pub adc_sampling_time_us: f64,
    pub inter_chirp_time_us: f64,
    pub active_frame_time_ms: f64,
    pub frame_time_ms: f64,
    pub duty_cycle_pct: f64,
    pub total_bandwidth_mhz: f64,
    pub valid_bandwidth_mhz: f64,
    pub range_resolution_m: f64,
    pub max_range_m: f64,
    pub wavelength_m: f64,
    pub velocity_resolution_mps: f64,
    pub max_velocity_mps: f64,
    pub num_range_bins: usize,
    pub num_doppler_bins: usize,
    pub radar_cube_size_kb: f64,
    pub frame_length: usize,
}

impl fmt::Display for RadarParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Calculated Radar Parameters ===")?;
        writeln!(f, "num_tx_channels: {}", self.num_tx_channels)?;
        writeln!(f, "num_rx_channels: {}", self.num_rx_channels)?;
        writeln!(f, "chirps_per_frame: {}", self.chirps_per_frame)?;
        writeln!(f, "adc_sampling_time: {:.2} us", self.adc_sampling_time_us)?;
        writeln!(f, "inter_chirp_time: {:.2} us", self.inter_chirp_time_us)?;
        writeln!(f, "active_frame_time: {:.2} ms", self.active_frame_time_ms)?;
        writeln!(f, "frame_time: {:.2} ms", self.frame_time_ms)?;
        writeln!(f, "duty_cycle: {:.2} %", self.duty_cycle_pct)?;
        writeln!(f, "total_bandwidth: {:.2} MHz", self.total_bandwidth_mhz)?;
        writeln!(f, "valid_bandwidth: {:.2} MHz", self.valid_bandwidth_mhz)?;
        writeln!(f, "range_resolution: {:.4} m", self.range_resolution_m)?;
        writeln!(f, "max_range: {:.2} m", self.max_range_m)?;
        writeln!(f, "velocity_resolution: {:.4} m/s", self.velocity_resolution_mps)?;
        writeln!(f, "max_velocity: {:.2} m/s", self.max_velocity_mps)?;
        writeln!(f, "num_range_bins: {}", self.num_range_bins)?;
        writeln!(f, "num_doppler_bins: {}", self.num_doppler_bins)?;
        writeln!(f, "radar_cube_size: {:.2} KB", self.radar_cube_size_kb)?;
        write!(f, "===================================")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::directives::tests::IWR1843_CFG;

    fn reference() -> RadarConfig {
        IWR1843_CFG.parse().unwrap()
    }

    fn close(actual: f64, expected: f64) {
        let tolerance = 1e-9 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() < tolerance,
            "{} != {}",
            actual,
            expected
        );
    }

    #[test]
    fn channel_counts_follow_masks() {
        let config = reference();
        assert_eq!(config.num_rx_channels(), 4);
        assert_eq!(config.num_tx_channels(), 3);
        assert_eq!(config.chirps_per_frame(), 3);
        assert!(config.is_complex_output());
    }

    #[test]
    fn timing_quantities_match_formulas() {
        let config = reference();
        let sampling = 256.0 / 7200.0 * 1000.0;
        close(config.adc_sampling_time_us(), sampling);
        close(config.inter_chirp_time_us(), 7.0 + (39.0 - sampling));
        close(config.active_frame_time_ms(), 3.0 * 46.0 * 16.0 / 1000.0);
        close(config.duty_cycle_pct(), 3.0 * 46.0 * 16.0 / 1000.0 / 100.0 * 100.0);
    }

    #[test]
    fn resolution_quantities_match_formulas() {
        let config = reference();
        let sampling = 256.0 / 7200.0 * 1000.0;
        let wavelength = SPEED_OF_LIGHT / 77e9;

        close(config.valid_bandwidth_mhz(), sampling * 100.0);
        close(
            config.range_resolution_m(),
            SPEED_OF_LIGHT / (2.0 * sampling * 100.0 * 1e6),
        );
        close(
            config.max_range_m(),
            0.8 * 7200.0 * 1000.0 * SPEED_OF_LIGHT / (2.0 * 100.0 * 1e6),
        );
        close(config.wavelength_m(), wavelength);
        close(
            config.velocity_resolution_mps(),
            wavelength / (2.0 * 16.0 * 3.0 * 46.0 * 1e-6),
        );
        close(
            config.max_velocity_mps(),
            wavelength / (4.0 * 3.0 * 46.0 * 1e-6),
        );
    }

    #[test]
    fn cube_size_sets_frame_length() {
        let config = reference();
        close(config.radar_cube_size_kb(), 2.0 * 256.0 * 3.0 * 16.0 * 4.0 / 1024.0);
        assert_eq!(config.frame_length(), 98_304);

        let layout = config.frame_layout();
        assert_eq!((layout.samples, layout.antennas, layout.chirps), (256, 4, 48));
        assert_eq!(layout.frame_length(), config.frame_length());
    }

    #[test]
    fn real_output_halves_frame_length() {
        let text = IWR1843_CFG.replace("adcbufCfg -1 0 1 1 1", "adcbufCfg -1 1 1 1 1");
        let config: RadarConfig = text.parse().unwrap();
        assert!(!config.is_complex_output());
        assert_eq!(config.frame_length(), 49_152);
    }

    #[test]
    fn zero_tx_mask_yields_zero_velocity() {
        let text = IWR1843_CFG.replace("channelCfg 15 7 0", "channelCfg 15 0 0");
        let config: RadarConfig = text.parse().unwrap();
        assert_eq!(config.velocity_resolution_mps(), 0.0);
        assert_eq!(config.max_velocity_mps(), 0.0);
    }

    #[test]
    fn snapshot_serializes_every_quantity() {
        let parameters = reference().parameters();
        assert_eq!(parameters.num_range_bins, 256);
        assert_eq!(parameters.num_doppler_bins, 16);
        let json = serde_json::to_value(&parameters).unwrap();
        assert!(json.get("max_velocity_mps").is_some());
        assert!(parameters.to_string().contains("range_resolution"));
    }
}
