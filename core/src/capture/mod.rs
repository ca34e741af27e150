//! Capture-card control protocol and the sensor-control seam.

pub mod controller;
pub mod packet;
pub mod sensor;

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

pub use controller::{CaptureController, ControllerSettings, HandshakeReport};
pub use packet::{Command, CommandPacket, STARTUP_SEQUENCE};
pub use sensor::{configure_sensor, stop_sensor, SensorControl, SENSOR_SETTLE};

const HOST_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 33, 30);

/// Local endpoint receiving the ADC stream.
pub const DEFAULT_DATA_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(HOST_IP, 4098));
/// Local endpoint of the control channel.
pub const DEFAULT_CONTROL_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(HOST_IP, 4096));
/// The capture card's control endpoint.
pub const DEFAULT_FRONT_END_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 33, 180), 4096));
