use crate::prelude::SensorError;
use log::{error, info};
use std::thread;
use std::time::Duration;

/// Pause between pushing a configuration and starting the sensor.
pub const SENSOR_SETTLE: Duration = Duration::from_secs(1);

/// Whatever transport pushes configuration to the radar sensor module.
pub trait SensorControl {
    fn stop(&mut self) -> Result<(), SensorError>;
    fn send_config(&mut self, config_text: &str) -> Result<(), SensorError>;
    fn start(&mut self) -> Result<(), SensorError>;
}

/// Stops the sensor, pushes `config_text`, waits `settle` and starts streaming.
pub fn configure_sensor<S>(sensor: &mut S, config_text: &str, settle: Duration) -> Result<(), SensorError>
where
    S: SensorControl + ?Sized,
{
    sensor.stop()?;
    sensor.send_config(config_text)?;
    thread::sleep(settle);
    sensor.start()?;
    info!("radar started and streaming data");
    Ok(())
}

/// Teardown helper; a failing stop is logged and swallowed.
pub fn stop_sensor<S>(sensor: &mut S)
where
    S: SensorControl + ?Sized,
{
    match sensor.stop() {
        Ok(()) => info!("radar stopped"),
        Err(err) => error!("Error stopping radar: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_start: bool,
    }

    impl SensorControl for Recorder {
        fn stop(&mut self) -> Result<(), SensorError> {
            self.calls.push("stop".into());
            Ok(())
        }

        fn send_config(&mut self, config_text: &str) -> Result<(), SensorError> {
            self.calls.push(format!("config:{}", config_text.lines().count()));
            Ok(())
        }

        fn start(&mut self) -> Result<(), SensorError> {
            self.calls.push("start".into());
            if self.fail_start {
                return Err(SensorError {
                    operation: "start",
                    message: "no response".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn configure_runs_stop_config_start() {
        let mut sensor = Recorder::default();
        configure_sensor(&mut sensor, "sensorStop\nframeCfg 0 2 16 0 100 1 0\n", Duration::ZERO)
            .unwrap();
        assert_eq!(sensor.calls, vec!["stop", "config:2", "start"]);
    }

    #[test]
    fn start_failure_is_reported() {
        let mut sensor = Recorder {
            fail_start: true,
            ..Recorder::default()
        };
        let err = configure_sensor(&mut sensor, "", Duration::ZERO).unwrap_err();
        assert_eq!(err.operation, "start");
        stop_sensor(&mut sensor);
        assert_eq!(sensor.calls.last().map(String::as_str), Some("stop"));
    }
}
