use crate::pipeline::context::{PipelineContext, PipelineSettings};
use crate::pipeline::frame::{DatagramFault, FrameAssembler, RawFrame};
use crate::pipeline::task::{StopSignal, WorkerHandle};
use crate::prelude::PipelineError;
use crate::telemetry::LogManager;
use log::{error, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const MAX_DATAGRAM: usize = 65_536;

/// Receives data-channel datagrams and feeds whole frames to the raw-frame queue.
pub struct FrameIngestor {
    context: Arc<PipelineContext>,
    bind_addr: SocketAddr,
    local_addr: Option<SocketAddr>,
    worker: Option<WorkerHandle>,
}

impl FrameIngestor {
    pub fn new(context: Arc<PipelineContext>, bind_addr: SocketAddr) -> Self {
        Self {
            context,
            bind_addr,
            local_addr: None,
            worker: None,
        }
    }

    /// Binds the data socket and spawns the receive loop. Bind failures surface here.
    pub fn start(&mut self) -> Result<SocketAddr, PipelineError> {
        if self.is_running() {
            return Err(PipelineError::AlreadyRunning("frame ingestor"));
        }
        let socket = bind_data_socket(self.bind_addr, self.context.settings())?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| PipelineError::SocketBind {
                addr: self.bind_addr,
                source,
            })?;
        info!("data socket bound to {}", local_addr);

        let context = Arc::clone(&self.context);
        self.worker = Some(WorkerHandle::spawn("frame-ingestor", move |stop| {
            receive_loop(&socket, &context, &stop)
        })?);
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    pub fn request_stop(&self) {
        if let Some(worker) = &self.worker {
            worker.request_stop();
        }
    }

    /// Returns false if the receive loop is still alive after `deadline`.
    pub fn join(&mut self, deadline: Duration) -> bool {
        match self.worker.as_mut() {
            Some(worker) => worker.join(deadline),
            None => true,
        }
    }
}

fn bind_data_socket(addr: SocketAddr, settings: &PipelineSettings) -> Result<UdpSocket, PipelineError> {
    let bind_err = |source: io::Error| PipelineError::SocketBind { addr, source };
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(bind_err)?;
    if let Err(err) = socket.set_recv_buffer_size(settings.recv_buffer_size) {
        warn!(
            "could not raise receive buffer to {} bytes: {}",
            settings.recv_buffer_size, err
        );
    }
    socket.bind(&addr.into()).map_err(bind_err)?;
    let socket: UdpSocket = socket.into();
    socket
        .set_read_timeout(Some(settings.socket_timeout))
        .map_err(bind_err)?;
    Ok(socket)
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn receive_loop(socket: &UdpSocket, context: &PipelineContext, stop: &StopSignal) {
    let logger = LogManager::new("frame-ingestor");
    let mut assembler = FrameAssembler::new(context.frame_length());
    let mut datagram = vec![0u8; MAX_DATAGRAM];
    let mut frames = 0u64;
    logger.record("starting data reception");

    while !stop.is_requested() {
        match socket.recv_from(&mut datagram) {
            Ok((len, _)) => {
                context.metrics().record_packet();
                match assembler.push_datagram(&datagram[..len]) {
                    Ok(completed) => {
                        for _ in 0..publish_batch(context, completed, stop) {
                            frames += 1;
                            logger.progress(frames);
                        }
                    }
                    Err(DatagramFault::Undersized(size)) => {
                        context.metrics().record_undersized();
                        warn!("received undersized packet: {} bytes", size);
                    }
                }
            }
            Err(err) if is_timeout(&err) => continue,
            Err(err) => {
                error!("error receiving data: {}", err);
                thread::sleep(context.settings().socket_timeout);
            }
        }
    }
    logger.record(&format!(
        "stopped after {} frames ({} bytes pending)",
        frames,
        assembler.pending() * 2
    ));
}

/// Publishes every frame completed by one datagram under a single put deadline.
///
/// Frames left once a stop is requested are dropped without waiting. Returns the
/// number of frames handled.
fn publish_batch(context: &PipelineContext, completed: Vec<RawFrame>, stop: &StopSignal) -> u64 {
    let total = completed.len() as u64;
    let deadline = Instant::now() + context.settings().queue_put_timeout;
    let mut batch = completed.into_iter();
    for frame in batch.by_ref() {
        publish_frame_until(context, frame, deadline);
        if stop.is_requested() {
            break;
        }
    }

    let abandoned = batch.len();
    if abandoned > 0 {
        for _ in 0..abandoned {
            context.metrics().record_frame_assembled();
            context.metrics().record_frame_dropped();
        }
        warn!("stop requested, dropping {} pending frames", abandoned);
    }
    total
}

/// Offers a frame to the raw queue, dropping it when the queue stays full past the put timeout.
pub fn publish_frame(context: &PipelineContext, frame: RawFrame) -> bool {
    publish_frame_until(context, frame, Instant::now() + context.settings().queue_put_timeout)
}

fn publish_frame_until(context: &PipelineContext, frame: RawFrame, deadline: Instant) -> bool {
    context.metrics().record_frame_assembled();
    let sequence = frame.sequence;
    if context.raw_frames.offer_until(frame, deadline) {
        true
    } else {
        context.metrics().record_frame_dropped();
        warn!("raw frame queue full, dropping frame {}", sequence);
        false
    }
}
