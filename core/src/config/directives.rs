use crate::prelude::ConfigParseError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// `channelCfg <rxChannelEn> <txChannelEn> <cascading>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCfg {
    pub rx_mask: u32,
    pub tx_mask: u32,
    pub cascading: u32,
}

/// `adcCfg <numADCBits> <adcOutputFmt>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdcCfg {
    pub bits: u32,
    /// 0 real, 1 complex 1x, 2 complex 2x.
    pub output_format: u32,
}

/// `adcbufCfg <subFrameIdx> <adcOutputFmt> <sampleSwap> <chanInterleave> [chirpThreshold]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdcBufCfg {
    pub sub_frame_idx: i32,
    /// 0 complex, 1 real.
    pub output_format: u32,
    pub sample_swap: u32,
    pub chan_interleave: u32,
    pub chirp_threshold: Option<u32>,
}

/// `profileCfg`: one chirp profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileCfg {
    pub profile_id: u32,
    pub start_freq_ghz: f64,
    pub idle_time_us: f64,
    pub adc_start_time_us: f64,
    pub ramp_end_time_us: f64,
    pub tx_out_power: i32,
    pub tx_phase_shifter: i32,
    pub freq_slope_mhz_per_us: f64,
    pub tx_start_time_us: f64,
    pub adc_samples: usize,
    pub sample_rate_ksps: f64,
    pub hpf1_corner: u32,
    pub hpf2_corner: u32,
    pub rx_gain: u32,
}

/// `chirpCfg`: may appear several times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChirpCfg {
    pub start_idx: u32,
    pub end_idx: u32,
    pub profile_id: u32,
    pub start_freq_var_hz: f64,
    pub freq_slope_var_khz_per_us: f64,
    pub idle_time_var_us: f64,
    pub adc_start_time_var_us: f64,
    pub tx_enable: u32,
}

/// `frameCfg <chirpStartIdx> <chirpEndIdx> <numLoops> <numFrames> <framePeriodicity> <triggerSelect> [triggerDelay]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameCfg {
    pub chirp_start_idx: u32,
    pub chirp_end_idx: u32,
    pub num_loops: u32,
    pub num_frames: u32,
    pub frame_period_ms: f64,
    pub trigger_select: u32,
    pub trigger_delay_ms: Option<f64>,
}

/// `lowPower <don't care> <adcMode>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowPowerCfg {
    pub adc_mode: u32,
}

/// `guiMonitor` export flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuiMonitorCfg {
    pub detected_objects: u32,
    pub log_mag_range: u32,
    pub noise_profile: u32,
    pub range_azimuth_map: u32,
    pub range_doppler_map: u32,
    pub stats_info: u32,
}

/// Parsed radar configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarConfig {
    pub dfe_output_mode: Option<u32>,
    pub channel: ChannelCfg,
    pub adc: Option<AdcCfg>,
    pub adc_buffer: Option<AdcBufCfg>,
    pub profile: ProfileCfg,
    pub chirps: Vec<ChirpCfg>,
    pub frame: FrameCfg,
    pub low_power: Option<LowPowerCfg>,
    pub gui_monitor: Option<GuiMonitorCfg>,
}

impl RadarConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigParseError> {
        let contents = fs::read_to_string(path)?;
        contents.parse()
    }
}

impl FromStr for RadarConfig {
    type Err = ConfigParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut dfe_output_mode = None;
        let mut channel = None;
        let mut adc = None;
        let mut adc_buffer = None;
        let mut profile = None;
        let mut chirps = Vec::new();
        let mut frame = None;
        let mut low_power = None;
        let mut gui_monitor = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('%') {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let line_no = index + 1;

            match tokens[0] {
                "dfeDataOutputMode" => {
                    let d = Directive::new("dfeDataOutputMode", line_no, &tokens);
                    dfe_output_mode = Some(d.field(1, "modeType")?);
                }
                "channelCfg" => {
                    let d = Directive::new("channelCfg", line_no, &tokens);
                    channel = Some(ChannelCfg {
                        rx_mask: d.positive(1, "rxChannelEn")?,
                        tx_mask: d.field(2, "txChannelEn")?,
                        cascading: d.optional(3, "cascading")?.unwrap_or(0),
                    });
                }
                "adcCfg" => {
                    let d = Directive::new("adcCfg", line_no, &tokens);
                    let bits = match d.field::<u32>(1, "numADCBits")? {
                        1 => 14,
                        2 => 16,
                        _ => 12,
                    };
                    adc = Some(AdcCfg {
                        bits,
                        output_format: d.field(2, "adcOutputFmt")?,
                    });
                }
                "adcbufCfg" => {
                    let d = Directive::new("adcbufCfg", line_no, &tokens);
                    adc_buffer = Some(AdcBufCfg {
                        sub_frame_idx: d.field(1, "subFrameIdx")?,
                        output_format: d.field(2, "adcOutputFmt")?,
                        sample_swap: d.field(3, "sampleSwap")?,
                        chan_interleave: d.field(4, "chanInterleave")?,
                        chirp_threshold: d.optional(5, "chirpThreshold")?,
                    });
                }
                "profileCfg" => {
                    let d = Directive::new("profileCfg", line_no, &tokens);
                    profile = Some(ProfileCfg {
                        profile_id: d.field(1, "profileId")?,
                        start_freq_ghz: d.field(2, "startFreq")?,
                        idle_time_us: d.field(3, "idleTime")?,
                        adc_start_time_us: d.field(4, "adcStartTime")?,
                        ramp_end_time_us: d.field(5, "rampEndTime")?,
                        tx_out_power: d.field(6, "txOutPower")?,
                        tx_phase_shifter: d.field(7, "txPhaseShifter")?,
                        freq_slope_mhz_per_us: d.field(8, "freqSlopeConst")?,
                        tx_start_time_us: d.field(9, "txStartTime")?,
                        adc_samples: d.positive(10, "numAdcSamples")?,
                        sample_rate_ksps: d.field(11, "digOutSampleRate")?,
                        hpf1_corner: d.field(12, "hpfCornerFreq1")?,
                        hpf2_corner: d.field(13, "hpfCornerFreq2")?,
                        rx_gain: d.field(14, "rxGain")?,
                    });
                }
                "chirpCfg" => {
                    let d = Directive::new("chirpCfg", line_no, &tokens);
                    chirps.push(ChirpCfg {
                        start_idx: d.field(1, "chirpStartIdx")?,
                        end_idx: d.field(2, "chirpEndIdx")?,
                        profile_id: d.field(3, "profileId")?,
                        start_freq_var_hz: d.field(4, "startFreqVar")?,
                        freq_slope_var_khz_per_us: d.field(5, "freqSlopeVar")?,
                        idle_time_var_us: d.field(6, "idleTimeVar")?,
                        adc_start_time_var_us: d.field(7, "adcStartTimeVar")?,
                        tx_enable: d.field(8, "txEnable")?,
                    });
                }
                "frameCfg" => {
                    let d = Directive::new("frameCfg", line_no, &tokens);
                    let chirp_start_idx = d.field(1, "chirpStartIdx")?;
                    let chirp_end_idx = d.field(2, "chirpEndIdx")?;
                    if chirp_end_idx < chirp_start_idx {
                        return Err(ConfigParseError::EmptyChirpRange {
                            start: i64::from(chirp_start_idx),
                            end: i64::from(chirp_end_idx),
                        });
                    }
                    frame = Some(FrameCfg {
                        chirp_start_idx,
                        chirp_end_idx,
                        num_loops: d.positive(3, "numLoops")?,
                        num_frames: d.field(4, "numFrames")?,
                        frame_period_ms: d.field(5, "framePeriodicity")?,
                        trigger_select: d.field(6, "triggerSelect")?,
                        trigger_delay_ms: d.optional(7, "frameTriggerDelay")?,
                    });
                }
                "lowPower" => {
                    let d = Directive::new("lowPower", line_no, &tokens);
                    low_power = Some(LowPowerCfg {
                        adc_mode: d.field(2, "adcMode")?,
                    });
                }
                "guiMonitor" => {
                    let d = Directive::new("guiMonitor", line_no, &tokens);
                    gui_monitor = Some(GuiMonitorCfg {
                        detected_objects: d.field(2, "detectedObjects")?,
                        log_mag_range: d.field(3, "logMagRange")?,
                        noise_profile: d.field(4, "noiseProfile")?,
                        range_azimuth_map: d.field(5, "rangeAzimuthHeatMap")?,
                        range_doppler_map: d.field(6, "rangeDopplerHeatMap")?,
                        stats_info: d.field(7, "statsInfo")?,
                    });
                }
                _ => {}
            }
        }

        Ok(Self {
            dfe_output_mode,
            channel: channel.ok_or(ConfigParseError::MissingDirective("channelCfg"))?,
            adc,
            adc_buffer,
            profile: profile.ok_or(ConfigParseError::MissingDirective("profileCfg"))?,
            chirps,
            frame: frame.ok_or(ConfigParseError::MissingDirective("frameCfg"))?,
            low_power,
            gui_monitor,
        })
    }
}

/// Tokens of one directive line, with field accessors that report position.
struct Directive<'a> {
    name: &'static str,
    line: usize,
    tokens: &'a [&'a str],
}

impl<'a> Directive<'a> {
    fn new(name: &'static str, line: usize, tokens: &'a [&'a str]) -> Self {
        Self { name, line, tokens }
    }

    fn field<T: FromStr>(&self, index: usize, field: &'static str) -> Result<T, ConfigParseError> {
        self.optional(index, field)?
            .ok_or(ConfigParseError::MissingField {
                line: self.line,
                directive: self.name,
                field,
            })
    }

    fn optional<T: FromStr>(
        &self,
        index: usize,
        field: &'static str,
    ) -> Result<Option<T>, ConfigParseError> {
        self.tokens
            .get(index)
            .map(|token| {
                token.parse().map_err(|_| ConfigParseError::InvalidField {
                    line: self.line,
                    directive: self.name,
                    field,
                    value: (*token).to_string(),
                })
            })
            .transpose()
    }

    fn positive<T>(&self, index: usize, field: &'static str) -> Result<T, ConfigParseError>
    where
        T: FromStr + Default + PartialEq + ToString,
    {
        let value: T = self.field(index, field)?;
        if value == T::default() {
            return Err(ConfigParseError::InvalidField {
                line: self.line,
                directive: self.name,
                field,
                value: value.to_string(),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const IWR1843_CFG: &str = "\
% IWR1843 3TX 4RX, 256 samples
sensorStop
flushCfg
dfeDataOutputMode 1
channelCfg 15 7 0
adcCfg 2 1
adcbufCfg -1 0 1 1 1
profileCfg 0 77 7 3 39 0 0 100 1 256 7200 0 0 30
chirpCfg 0 0 0 0 0 0 0 1
chirpCfg 1 1 0 0 0 0 0 4
chirpCfg 2 2 0 0 0 0 0 2

frameCfg 0 2 16 0 100 1 0
lowPower 0 0
guiMonitor -1 1 1 0 0 0 1
sensorStart
";

    #[test]
    fn parses_reference_configuration() {
        let config: RadarConfig = IWR1843_CFG.parse().unwrap();
        assert_eq!(config.dfe_output_mode, Some(1));
        assert_eq!(config.channel.rx_mask, 15);
        assert_eq!(config.adc.unwrap().bits, 16);
        assert_eq!(config.adc_buffer.unwrap().sub_frame_idx, -1);
        assert_eq!(config.profile.adc_samples, 256);
        assert_eq!(config.profile.sample_rate_ksps, 7200.0);
        assert_eq!(config.chirps.len(), 3);
        assert_eq!(config.chirps[1].tx_enable, 4);
        assert_eq!(config.frame.num_loops, 16);
        assert_eq!(config.frame.trigger_delay_ms, Some(0.0));
        assert_eq!(config.low_power.unwrap().adc_mode, 0);
        assert_eq!(config.gui_monitor.unwrap().detected_objects, 1);
    }

    #[test]
    fn missing_frame_directive_is_an_error() {
        let text: String = IWR1843_CFG
            .lines()
            .filter(|line| !line.starts_with("frameCfg"))
            .map(|line| format!("{}\n", line))
            .collect();
        assert!(matches!(
            text.parse::<RadarConfig>(),
            Err(ConfigParseError::MissingDirective("frameCfg"))
        ));
    }

    #[test]
    fn inverted_chirp_range_is_an_error() {
        let text = IWR1843_CFG.replace("frameCfg 0 2 16", "frameCfg 2 0 16");
        assert!(matches!(
            text.parse::<RadarConfig>(),
            Err(ConfigParseError::EmptyChirpRange { start: 2, end: 0 })
        ));
    }

    #[test]
    fn malformed_field_reports_line_and_name() {
        let text = IWR1843_CFG.replace("channelCfg 15 7 0", "channelCfg fifteen 7 0");
        match text.parse::<RadarConfig>() {
            Err(ConfigParseError::InvalidField {
                line, directive, field, value,
            }) => {
                assert_eq!(line, 5);
                assert_eq!(directive, "channelCfg");
                assert_eq!(field, "rxChannelEn");
                assert_eq!(value, "fifteen");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn truncated_profile_reports_missing_field() {
        let text = IWR1843_CFG.replace("7200 0 0 30", "7200");
        assert!(matches!(
            text.parse::<RadarConfig>(),
            Err(ConfigParseError::MissingField {
                field: "hpfCornerFreq1",
                ..
            })
        ));
    }

    #[test]
    fn zero_loops_are_rejected() {
        let text = IWR1843_CFG.replace("frameCfg 0 2 16", "frameCfg 0 2 0");
        assert!(matches!(
            text.parse::<RadarConfig>(),
            Err(ConfigParseError::InvalidField { field: "numLoops", .. })
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let path = std::env::temp_dir().join(format!("fmcwcore-{}.cfg", std::process::id()));
        fs::write(&path, IWR1843_CFG).unwrap();
        let config = RadarConfig::load(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(config.frame.frame_period_ms, 100.0);
    }
}
