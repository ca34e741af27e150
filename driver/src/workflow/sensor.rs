use crate::generator::profile::GeneratorConfig;
use crate::generator::stream::SyntheticStream;
use fmcwcore::capture::SensorControl;
use fmcwcore::config::RadarConfig;
use fmcwcore::prelude::SensorError;
use log::info;
use std::net::SocketAddr;
use std::time::Duration;

/// Used when the sensor module is driven by an external tool; every call only logs.
#[derive(Debug, Default)]
pub struct DetachedSensor;

impl SensorControl for DetachedSensor {
    fn stop(&mut self) -> Result<(), SensorError> {
        info!("sensor control detached: stop skipped");
        Ok(())
    }

    fn send_config(&mut self, config_text: &str) -> Result<(), SensorError> {
        let commands = config_text
            .lines()
            .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('%'))
            .count();
        info!(
            "sensor control detached: {} configuration commands must be sent externally",
            commands
        );
        Ok(())
    }

    fn start(&mut self) -> Result<(), SensorError> {
        info!("sensor control detached: start skipped");
        Ok(())
    }
}

/// A software sensor: the configuration it receives sizes a synthetic frame stream.
pub struct SyntheticSensor {
    target: SocketAddr,
    generator: GeneratorConfig,
    stream: Option<SyntheticStream>,
    stop_deadline: Duration,
}

impl SyntheticSensor {
    pub fn new(target: SocketAddr, generator: GeneratorConfig, stop_deadline: Duration) -> Self {
        Self {
            target,
            generator,
            stream: None,
            stop_deadline,
        }
    }

    #[cfg(test)]
    pub fn is_streaming(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(SyntheticStream::is_running)
    }
}

impl SensorControl for SyntheticSensor {
    fn stop(&mut self) -> Result<(), SensorError> {
        if let Some(stream) = self.stream.as_mut() {
            if !stream.stop(self.stop_deadline) {
                return Err(SensorError {
                    operation: "stop",
                    message: format!("stream still running after {:?}", self.stop_deadline),
                });
            }
        }
        Ok(())
    }

    fn send_config(&mut self, config_text: &str) -> Result<(), SensorError> {
        let config: RadarConfig = config_text.parse().map_err(|err| SensorError {
            operation: "send_config",
            message: format!("{}", err),
        })?;
        let mut generator = self.generator.clone();
        generator.frame_period_ms = config.frame.frame_period_ms.max(1.0).round() as u64;
        self.stream = Some(SyntheticStream::new(
            config.frame_layout(),
            generator,
            self.target,
        ));
        Ok(())
    }

    fn start(&mut self) -> Result<(), SensorError> {
        let stream = self.stream.as_mut().ok_or_else(|| SensorError {
            operation: "start",
            message: "no configuration has been sent".to_string(),
        })?;
        stream.start().map_err(|err| SensorError {
            operation: "start",
            message: format!("{:#}", err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmcwcore::capture::configure_sensor;
    use std::net::UdpSocket;

    const CFG: &str = "\
channelCfg 3 1 0
profileCfg 0 77 7 3 39 0 0 100 1 8 7200 0 0 30
frameCfg 0 0 4 0 20 1 0
";

    #[test]
    fn synthetic_sensor_streams_after_configuration() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut sensor = SyntheticSensor::new(
            receiver.local_addr().unwrap(),
            GeneratorConfig::default(),
            Duration::from_secs(1),
        );
        assert!(sensor.start().is_err());

        configure_sensor(&mut sensor, CFG, Duration::ZERO).unwrap();
        assert!(sensor.is_streaming());
        let mut buffer = [0u8; 2048];
        let (len, _) = receiver.recv_from(&mut buffer).unwrap();
        assert_eq!(len, 10 + 128 * 2);

        sensor.stop().unwrap();
        assert!(!sensor.is_streaming());
    }

    #[test]
    fn synthetic_sensor_rejects_bad_configuration() {
        let mut sensor = SyntheticSensor::new(
            "127.0.0.1:9".parse().unwrap(),
            GeneratorConfig::default(),
            Duration::from_secs(1),
        );
        let err = sensor.send_config("profileCfg 0 77\n").unwrap_err();
        assert_eq!(err.operation, "send_config");
    }

    #[test]
    fn detached_sensor_accepts_everything() {
        let mut sensor = DetachedSensor;
        configure_sensor(&mut sensor, CFG, Duration::ZERO).unwrap();
    }
}
