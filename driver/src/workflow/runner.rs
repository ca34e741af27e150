use crate::gui_bridge::bridge::{BridgeState, DisplayPump, SharedModel};
use crate::port_reclaim::reclaim_udp_port;
use crate::workflow::config::WorkflowConfig;
use crate::workflow::sensor::{DetachedSensor, SyntheticSensor};
use anyhow::{Context, Result};
use fmcwcore::capture::{configure_sensor, stop_sensor, CaptureController, SensorControl};
use fmcwcore::config::{RadarConfig, RadarParameters};
use fmcwcore::pipeline::{FrameIngestor, FrameTransformer, PipelineContext};
use fmcwcore::prelude::CaptureError;
use log::{error, info, warn};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

/// How a session reaches its data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Feed the pipeline from the built-in generator over loopback instead of hardware.
    pub synthetic: bool,
    /// Do not run the capture-card handshake.
    pub skip_capture: bool,
    /// On a control-port bind failure, terminate the holder and retry once.
    pub reclaim_port: bool,
}

/// What teardown managed to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub ingestor_stopped: bool,
    pub transformer_stopped: bool,
    pub pump_stopped: bool,
    pub drained: usize,
}

/// Holds a parsed radar configuration and starts acquisition sessions from it.
#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    radar: RadarConfig,
    radar_text: String,
}

impl Runner {
    pub fn new(config: WorkflowConfig, radar_text: String) -> Result<Self> {
        let radar: RadarConfig = radar_text.parse().context("parsing radar configuration")?;
        Ok(Self {
            config,
            radar,
            radar_text,
        })
    }

    pub fn from_path<P: AsRef<Path>>(config: WorkflowConfig, path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let text = fs::read_to_string(path_ref)
            .with_context(|| format!("reading radar config {}", path_ref.display()))?;
        Self::new(config, text).with_context(|| format!("loading {}", path_ref.display()))
    }

    pub fn parameters(&self) -> RadarParameters {
        self.radar.parameters()
    }

    /// Binds and starts the workers, brings up the capture card and starts the sensor.
    pub fn start(&self, options: SessionOptions) -> Result<Session> {
        let parameters = self.parameters();
        info!("\n{}", parameters);

        let context = PipelineContext::new(self.radar.clone(), self.config.pipeline_settings());
        context.set_channel(self.config.channel);

        let data_addr = if options.synthetic {
            SocketAddr::from(([127, 0, 0, 1], 0))
        } else {
            self.config.data_addr
        };
        let mut ingestor = FrameIngestor::new(Arc::clone(&context), data_addr);
        let bound = ingestor.start().context("starting frame ingestor")?;

        let model = SharedModel::default();
        let mut session = Session {
            config: self.config.clone(),
            context: Arc::clone(&context),
            parameters: Arc::new(parameters),
            model: Arc::clone(&model),
            ingestor,
            transformer: FrameTransformer::new(Arc::clone(&context)),
            pump: None,
            controller: None,
            sensor: Box::new(DetachedSensor),
        };

        if let Err(err) = session.bring_up(self, options, bound) {
            session.shutdown();
            return Err(err);
        }
        Ok(session)
    }
}

/// A running acquisition session. Dropping it without [`Session::shutdown`] only
/// signals the workers to stop.
pub struct Session {
    config: WorkflowConfig,
    context: Arc<PipelineContext>,
    parameters: Arc<RadarParameters>,
    model: SharedModel,
    ingestor: FrameIngestor,
    transformer: FrameTransformer,
    pump: Option<DisplayPump>,
    controller: Option<CaptureController>,
    sensor: Box<dyn SensorControl + Send>,
}

impl Session {
    fn bring_up(&mut self, runner: &Runner, options: SessionOptions, bound: SocketAddr) -> Result<()> {
        self.transformer
            .start()
            .context("starting frame transformer")?;
        self.pump = Some(DisplayPump::start(
            Arc::clone(&self.context),
            Arc::clone(&self.model),
            self.config.cfar,
        )?);

        if options.synthetic {
            self.sensor = Box::new(SyntheticSensor::new(
                bound,
                self.config.generator.clone(),
                self.config.join_deadline(),
            ));
        } else if options.skip_capture {
            info!("capture-card handshake skipped");
        } else {
            let controller = self.bind_controller(options.reclaim_port)?;
            let report = controller.initialize();
            if !report.is_complete() {
                warn!(
                    "capture card did not acknowledge: {:?}",
                    report
                        .missed
                        .iter()
                        .map(|command| command.name())
                        .collect::<Vec<_>>()
                );
            }
            self.controller = Some(controller);
        }

        configure_sensor(
            self.sensor.as_mut(),
            &runner.radar_text,
            self.config.sensor_settle(),
        )
        .context("starting radar sensor")?;
        Ok(())
    }

    fn bind_controller(&self, reclaim_port: bool) -> Result<CaptureController> {
        let settings = self.config.controller_settings();
        match CaptureController::bind(settings.clone()) {
            Ok(controller) => Ok(controller),
            Err(err @ CaptureError::SocketBind { .. }) if reclaim_port => {
                error!("{}; attempting to reclaim the port", err);
                reclaim_udp_port(settings.local_addr.port());
                CaptureController::bind(settings).context("binding control socket after reclaim")
            }
            Err(err) => Err(err).context("binding control socket"),
        }
    }

    pub fn data_addr(&self) -> Option<SocketAddr> {
        self.ingestor.local_addr()
    }

    pub fn bridge_state(&self) -> BridgeState {
        BridgeState {
            context: Arc::clone(&self.context),
            model: Arc::clone(&self.model),
            parameters: Arc::clone(&self.parameters),
        }
    }

    /// Stops the sensor, joins every worker with the configured deadline, sends STOP
    /// to the capture card and drains the queues. Nothing here is fatal.
    pub fn shutdown(mut self) -> ShutdownReport {
        info!("starting cleanup");
        stop_sensor(self.sensor.as_mut());

        let deadline = self.config.join_deadline();
        self.ingestor.request_stop();
        self.transformer.request_stop();
        if let Some(pump) = &self.pump {
            pump.request_stop();
        }
        let ingestor_stopped = self.ingestor.join(deadline);
        let transformer_stopped = self.transformer.join(deadline);
        let pump_stopped = self
            .pump
            .as_mut()
            .map_or(true, |pump| pump.join(deadline));
        for (name, stopped) in [
            ("ingestor", ingestor_stopped),
            ("transformer", transformer_stopped),
            ("display pump", pump_stopped),
        ] {
            if stopped {
                info!("{} thread stopped", name);
            } else {
                warn!("{} thread did not stop gracefully", name);
            }
        }

        if let Some(controller) = self.controller.take() {
            controller.shutdown();
        }
        let drained = self.context.drain_queues();
        info!("cleanup completed ({} queued items discarded)", drained);
        ShutdownReport {
            ingestor_stopped,
            transformer_stopped,
            pump_stopped,
            drained,
        }
    }
}
