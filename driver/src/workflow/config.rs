use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use fmcwcore::capture::{
    ControllerSettings, DEFAULT_CONTROL_ADDR, DEFAULT_DATA_ADDR, DEFAULT_FRONT_END_ADDR,
};
use fmcwcore::pipeline::PipelineSettings;
use fmcwcore::processing::CfarParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime settings for one acquisition session, loaded from YAML.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub radar_config: Option<PathBuf>,
    pub data_addr: SocketAddr,
    pub control_addr: SocketAddr,
    pub front_end_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub recv_buffer_size: usize,
    pub socket_timeout_ms: u64,
    pub queue_put_timeout_ms: u64,
    pub queue_get_timeout_ms: u64,
    pub raw_queue_capacity: usize,
    pub result_queue_capacity: usize,
    pub ack_timeout_ms: u64,
    pub command_delay_ms: u64,
    pub sensor_settle_ms: u64,
    pub join_deadline_ms: u64,
    pub channel: usize,
    pub cfar: CfarParams,
    /// Frame source used by `--synthetic`.
    pub generator: GeneratorConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            radar_config: None,
            data_addr: DEFAULT_DATA_ADDR,
            control_addr: DEFAULT_CONTROL_ADDR,
            front_end_addr: DEFAULT_FRONT_END_ADDR,
            http_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            recv_buffer_size: 2 * 1024 * 1024,
            socket_timeout_ms: 100,
            queue_put_timeout_ms: 500,
            queue_get_timeout_ms: 100,
            raw_queue_capacity: 16,
            result_queue_capacity: 8,
            ack_timeout_ms: 1000,
            command_delay_ms: 100,
            sensor_settle_ms: 1000,
            join_deadline_ms: 2000,
            channel: 0,
            cfar: CfarParams::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            socket_timeout: Duration::from_millis(self.socket_timeout_ms),
            queue_put_timeout: Duration::from_millis(self.queue_put_timeout_ms),
            queue_get_timeout: Duration::from_millis(self.queue_get_timeout_ms),
            raw_queue_capacity: self.raw_queue_capacity,
            result_queue_capacity: self.result_queue_capacity,
            recv_buffer_size: self.recv_buffer_size,
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            local_addr: self.control_addr,
            front_end_addr: self.front_end_addr,
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            command_delay: Duration::from_millis(self.command_delay_ms),
        }
    }

    pub fn sensor_settle(&self) -> Duration {
        Duration::from_millis(self.sensor_settle_ms)
    }

    pub fn join_deadline(&self) -> Duration {
        Duration::from_millis(self.join_deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_capture_card_network() {
        let cfg = WorkflowConfig::default();
        assert_eq!(cfg.data_addr.to_string(), "192.168.33.30:4098");
        assert_eq!(cfg.front_end_addr.to_string(), "192.168.33.180:4096");
        let settings = cfg.pipeline_settings();
        assert_eq!(settings.socket_timeout, Duration::from_millis(100));
        assert_eq!(settings.queue_put_timeout, Duration::from_millis(500));
        assert_eq!(cfg.join_deadline(), Duration::from_secs(2));
    }

    #[test]
    fn config_load_reads_partial_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"data_addr: 127.0.0.1:5000\nraw_queue_capacity: 4\ncfar:\n  num_train: 12\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.data_addr.port(), 5000);
        assert_eq!(cfg.raw_queue_capacity, 4);
        assert_eq!(cfg.cfar.num_train, 12);
        assert_eq!(cfg.cfar.num_guard, CfarParams::default().num_guard);
        assert_eq!(cfg.queue_get_timeout_ms, 100);
    }

    #[test]
    fn config_load_reports_bad_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"data_addr: [not, an, address]\n").unwrap();
        let path = temp.into_temp_path();
        let err = WorkflowConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("parsing workflow config"));
    }
}
