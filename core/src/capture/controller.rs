use crate::capture::packet::{Command, CommandPacket, STARTUP_SEQUENCE};
use crate::capture::{DEFAULT_CONTROL_ADDR, DEFAULT_FRONT_END_ADDR};
use crate::prelude::CaptureError;
use log::{debug, error, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

const MAX_ACK: usize = 2048;

/// Addresses and pacing for the control channel.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub local_addr: SocketAddr,
    pub front_end_addr: SocketAddr,
    pub ack_timeout: Duration,
    pub command_delay: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            local_addr: DEFAULT_CONTROL_ADDR,
            front_end_addr: DEFAULT_FRONT_END_ADDR,
            ack_timeout: Duration::from_secs(1),
            command_delay: Duration::from_millis(100),
        }
    }
}

/// Outcome of the startup handshake; missed acknowledgements do not abort it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeReport {
    pub acknowledged: Vec<Command>,
    pub missed: Vec<Command>,
}

impl HandshakeReport {
    pub fn is_complete(&self) -> bool {
        self.missed.is_empty()
    }
}

/// Control-channel client for the capture card.
pub struct CaptureController {
    socket: UdpSocket,
    settings: ControllerSettings,
}

impl CaptureController {
    /// Binds the control socket with address reuse enabled.
    pub fn bind(settings: ControllerSettings) -> Result<Self, CaptureError> {
        let addr = settings.local_addr;
        let bind_err = |source: io::Error| CaptureError::SocketBind { addr, source };
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
            .map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;
        let socket: UdpSocket = socket.into();
        socket.set_read_timeout(Some(settings.ack_timeout))?;
        info!(
            "control socket bound to {}, front end at {}",
            socket.local_addr()?,
            settings.front_end_addr
        );
        Ok(Self { socket, settings })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CaptureError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn send(&self, command: Command) -> Result<(), CaptureError> {
        let bytes = CommandPacket::for_command(command).encode();
        self.socket.send_to(&bytes, self.settings.front_end_addr)?;
        debug!("sent {} ({} bytes)", command, bytes.len());
        Ok(())
    }

    /// Waits up to the ack timeout for a reply from the front end. Datagrams from other
    /// senders are skipped; reply contents are only logged.
    pub fn await_ack(&self, command: Command) -> Result<(), CaptureError> {
        let deadline = Instant::now() + self.settings.ack_timeout;
        let mut buffer = [0u8; MAX_ACK];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CaptureError::ProtocolTimeout(command.name()));
            }
            self.socket.set_read_timeout(Some(remaining))?;
            match self.socket.recv_from(&mut buffer) {
                Ok((len, from)) if from != self.settings.front_end_addr => {
                    warn!(
                        "ignoring {} bytes from {} while awaiting {}",
                        len, from, command
                    );
                }
                Ok((len, from)) => {
                    match CommandPacket::decode(&buffer[..len]) {
                        Ok(reply) => debug!(
                            "{} acknowledged by {} with {} ({} payload bytes)",
                            command,
                            from,
                            reply.command,
                            reply.payload.len()
                        ),
                        Err(err) => debug!("{} acknowledged by {}: {}", command, from, err),
                    }
                    return Ok(());
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(CaptureError::ProtocolTimeout(command.name()));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Sends the startup sequence, waiting for an acknowledgement after each command.
    pub fn initialize(&self) -> HandshakeReport {
        let mut report = HandshakeReport::default();
        for command in STARTUP_SEQUENCE {
            match self.send(command).and_then(|()| self.await_ack(command)) {
                Ok(()) => report.acknowledged.push(command),
                Err(err) => {
                    warn!("{}: {}; continuing", command, err);
                    report.missed.push(command);
                }
            }
            thread::sleep(self.settings.command_delay);
        }
        info!(
            "capture card handshake finished: {} acknowledged, {} missed",
            report.acknowledged.len(),
            report.missed.len()
        );
        report
    }

    /// Sends STOP and closes the socket. Failures are logged only.
    pub fn shutdown(self) {
        match self.send(Command::Stop) {
            Ok(()) => info!("capture card stopped, control socket closed"),
            Err(err) => error!("Error closing control socket: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_settings(front_end: SocketAddr) -> ControllerSettings {
        ControllerSettings {
            local_addr: "127.0.0.1:0".parse().unwrap(),
            front_end_addr: front_end,
            ack_timeout: Duration::from_millis(50),
            command_delay: Duration::ZERO,
        }
    }

    /// Replies to every command except `silent`, returning what it received.
    fn fake_front_end(silent: Command, expected: usize) -> (SocketAddr, thread::JoinHandle<Vec<Command>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let addr = socket.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            let mut buffer = [0u8; 64];
            while seen.len() < expected {
                let Ok((len, from)) = socket.recv_from(&mut buffer) else {
                    break;
                };
                let packet = CommandPacket::decode(&buffer[..len]).unwrap();
                if packet.command != silent {
                    let reply = CommandPacket::new(packet.command, vec![0, 0]).unwrap().encode();
                    socket.send_to(&reply, from).unwrap();
                }
                seen.push(packet.command);
            }
            seen
        });
        (addr, handle)
    }

    #[test]
    fn handshake_continues_past_missing_ack() {
        let (front_end, handle) = fake_front_end(Command::SetFpga, 6);
        let controller = CaptureController::bind(loopback_settings(front_end)).unwrap();

        let started = Instant::now();
        let report = controller.initialize();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.missed, vec![Command::SetFpga]);
        assert_eq!(
            report.acknowledged,
            vec![
                Command::Connect,
                Command::GetVersion,
                Command::SetPacket,
                Command::Start
            ]
        );
        assert!(!report.is_complete());

        controller.shutdown();
        let seen = handle.join().unwrap();
        let mut expected = STARTUP_SEQUENCE.to_vec();
        expected.push(Command::Stop);
        assert_eq!(seen, expected);
    }

    #[test]
    fn await_ack_times_out() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let controller =
            CaptureController::bind(loopback_settings(silent.local_addr().unwrap())).unwrap();
        assert!(matches!(
            controller.await_ack(Command::Connect),
            Err(CaptureError::ProtocolTimeout("CONNECT"))
        ));
    }

    #[test]
    fn replies_from_other_senders_are_not_acks() {
        let front_end = UdpSocket::bind("127.0.0.1:0").unwrap();
        let controller =
            CaptureController::bind(loopback_settings(front_end.local_addr().unwrap())).unwrap();
        let target = controller.local_addr().unwrap();
        let stray = UdpSocket::bind("127.0.0.1:0").unwrap();
        let reply = CommandPacket::for_command(Command::Connect).encode();

        stray.send_to(&reply, target).unwrap();
        assert!(matches!(
            controller.await_ack(Command::Connect),
            Err(CaptureError::ProtocolTimeout("CONNECT"))
        ));

        stray.send_to(&reply, target).unwrap();
        front_end.send_to(&reply, target).unwrap();
        assert!(controller.await_ack(Command::Connect).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn control_socket_allows_address_reuse() {
        let silent: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let first = CaptureController::bind(loopback_settings(silent)).unwrap();
        let settings = ControllerSettings {
            local_addr: first.local_addr().unwrap(),
            ..loopback_settings(silent)
        };
        assert!(CaptureController::bind(settings).is_ok());
    }
}
