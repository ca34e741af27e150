use crate::generator::profile::{build_frame, check_layout, GeneratorConfig, Packetizer};
use anyhow::Context;
use fmcwcore::pipeline::{FrameLayout, StopSignal, WorkerHandle};
use fmcwcore::telemetry::LogManager;
use log::{error, info, warn};
use rand::{rngs::StdRng, SeedableRng};
use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::Duration;

/// Streams generated frames to a data endpoint at the configured frame period.
pub struct SyntheticStream {
    layout: FrameLayout,
    config: GeneratorConfig,
    target: SocketAddr,
    worker: Option<WorkerHandle>,
}

impl SyntheticStream {
    pub fn new(layout: FrameLayout, config: GeneratorConfig, target: SocketAddr) -> Self {
        Self {
            layout,
            config,
            target,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.is_running() {
            return Ok(());
        }
        check_layout(&self.layout)?;
        let socket = UdpSocket::bind(("0.0.0.0", 0)).context("binding synthetic stream socket")?;
        let layout = self.layout;
        let config = self.config.clone();
        let target = self.target;
        self.worker = Some(WorkerHandle::spawn("synthetic-stream", move |stop| {
            stream_loop(&socket, target, &layout, &config, &stop)
        })?);
        info!("synthetic stream sending to {}", target);
        Ok(())
    }

    pub fn stop(&mut self, deadline: Duration) -> bool {
        match self.worker.take() {
            Some(mut worker) => {
                worker.request_stop();
                worker.join(deadline)
            }
            None => true,
        }
    }
}

fn stream_loop(
    socket: &UdpSocket,
    target: SocketAddr,
    layout: &FrameLayout,
    config: &GeneratorConfig,
    stop: &StopSignal,
) {
    let logger = LogManager::new("synthetic-stream");
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut packetizer = Packetizer::new(config.datagram_values);
    let period = Duration::from_millis(config.frame_period_ms);
    let mut frames = 0u64;

    while !stop.is_requested() {
        let values = match build_frame(layout, config, &mut rng) {
            Ok(values) => values,
            Err(err) => {
                error!("synthetic frame generation failed: {}", err);
                break;
            }
        };
        for datagram in packetizer.packetize(&values) {
            if let Err(err) = socket.send_to(&datagram, target) {
                warn!("synthetic datagram to {} failed: {}", target, err);
            }
        }
        frames += 1;
        logger.progress(frames);
        thread::sleep(period);
    }
    logger.record(&format!("sent {} frames", frames));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_delivers_datagrams_until_stopped() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let layout = FrameLayout {
            samples: 8,
            antennas: 2,
            chirps: 4,
            complex: true,
        };
        let config = GeneratorConfig {
            frame_period_ms: 5,
            datagram_values: 64,
            ..GeneratorConfig::default()
        };
        let mut stream = SyntheticStream::new(layout, config, receiver.local_addr().unwrap());
        stream.start().unwrap();

        let mut buffer = [0u8; 512];
        let (len, _) = receiver.recv_from(&mut buffer).unwrap();
        assert_eq!(len, 10 + 64 * 2);
        assert_eq!(&buffer[..4], &1u32.to_le_bytes());

        assert!(stream.stop(Duration::from_secs(1)));
        assert!(!stream.is_running());
    }
}
