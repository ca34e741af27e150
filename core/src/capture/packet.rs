use crate::prelude::CaptureError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PACKET_HEADER: u16 = 0xA55A;
pub const PACKET_FOOTER: u16 = 0xEEAA;
/// Header, code and length fields plus the footer.
pub const PACKET_OVERHEAD: usize = 8;

/// Fixed SET_FPGA configuration blob, in wire order.
pub const FPGA_CONFIG: [u8; 6] = [0x01, 0x02, 0x01, 0x02, 0x03, 0x1e];
/// Fixed SET_PACKET configuration blob, in wire order.
pub const PACKET_CONFIG: [u8; 6] = [0xc0, 0x05, 0x35, 0x0c, 0x00, 0x00];

/// Capture-card command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Command {
    Init = 0x01,
    Config = 0x02,
    SetFpga = 0x03,
    GetStatus = 0x04,
    Start = 0x05,
    Stop = 0x06,
    Reset = 0x07,
    Debug = 0x08,
    Connect = 0x09,
    SetMode = 0x0A,
    SetPacket = 0x0B,
    GetConfig = 0x0C,
    SetParams = 0x0D,
    GetVersion = 0x0E,
}

/// Commands sent, in order, when bringing the capture card up. STOP is reserved for teardown.
pub const STARTUP_SEQUENCE: [Command; 5] = [
    Command::Connect,
    Command::GetVersion,
    Command::SetFpga,
    Command::SetPacket,
    Command::Start,
];

impl Command {
    pub const ALL: [Command; 14] = [
        Command::Init,
        Command::Config,
        Command::SetFpga,
        Command::GetStatus,
        Command::Start,
        Command::Stop,
        Command::Reset,
        Command::Debug,
        Command::Connect,
        Command::SetMode,
        Command::SetPacket,
        Command::GetConfig,
        Command::SetParams,
        Command::GetVersion,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Init => "INIT",
            Command::Config => "CONFIG",
            Command::SetFpga => "SET_FPGA",
            Command::GetStatus => "GET_STATUS",
            Command::Start => "START",
            Command::Stop => "STOP",
            Command::Reset => "RESET",
            Command::Debug => "DEBUG",
            Command::Connect => "CONNECT",
            Command::SetMode => "SET_MODE",
            Command::SetPacket => "SET_PACKET",
            Command::GetConfig => "GET_CONFIG",
            Command::SetParams => "SET_PARAMS",
            Command::GetVersion => "GET_VERSION",
        }
    }

    fn default_payload(self) -> &'static [u8] {
        match self {
            Command::SetFpga => &FPGA_CONFIG,
            Command::SetPacket => &PACKET_CONFIG,
            _ => &[],
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.code())
    }
}

/// `header | code | payload length | payload | footer`, all fields little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    pub command: Command,
    pub payload: Vec<u8>,
}

impl CommandPacket {
    /// Rejects payloads too long for the 16-bit length field.
    pub fn new(command: Command, payload: Vec<u8>) -> Result<Self, CaptureError> {
        if payload.len() > usize::from(u16::MAX) {
            return Err(CaptureError::MalformedPacket(format!(
                "{}-byte payload exceeds the {}-byte length field",
                payload.len(),
                u16::MAX
            )));
        }
        Ok(Self { command, payload })
    }

    /// The packet the startup handshake sends for `command`, fixed blobs included.
    pub fn for_command(command: Command) -> Self {
        Self {
            command,
            payload: command.default_payload().to_vec(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PACKET_OVERHEAD + self.payload.len());
        bytes.extend_from_slice(&PACKET_HEADER.to_le_bytes());
        bytes.extend_from_slice(&self.command.code().to_le_bytes());
        bytes.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes.extend_from_slice(&PACKET_FOOTER.to_le_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CaptureError> {
        if bytes.len() < PACKET_OVERHEAD {
            return Err(CaptureError::MalformedPacket(format!(
                "{} bytes is shorter than the {}-byte envelope",
                bytes.len(),
                PACKET_OVERHEAD
            )));
        }
        let word = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);

        let header = word(0);
        if header != PACKET_HEADER {
            return Err(CaptureError::MalformedPacket(format!(
                "bad header 0x{:04X}",
                header
            )));
        }
        let code = word(2);
        let command = Command::from_code(code).ok_or_else(|| {
            CaptureError::MalformedPacket(format!("unknown command code 0x{:04X}", code))
        })?;
        let length = word(4) as usize;
        if bytes.len() != PACKET_OVERHEAD + length {
            return Err(CaptureError::MalformedPacket(format!(
                "length field {} does not match {}-byte packet",
                length,
                bytes.len()
            )));
        }
        let footer = word(6 + length);
        if footer != PACKET_FOOTER {
            return Err(CaptureError::MalformedPacket(format!(
                "bad footer 0x{:04X}",
                footer
            )));
        }
        Ok(Self {
            command,
            payload: bytes[6..6 + length].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_fpga_encodes_fixed_blob() {
        let bytes = CommandPacket::for_command(Command::SetFpga).encode();
        assert_eq!(
            bytes,
            vec![0x5A, 0xA5, 0x03, 0x00, 0x06, 0x00, 0x01, 0x02, 0x01, 0x02, 0x03, 0x1E, 0xAA, 0xEE]
        );
    }

    #[test]
    fn payloadless_commands_are_eight_bytes() {
        let bytes = CommandPacket::for_command(Command::Connect).encode();
        assert_eq!(bytes, vec![0x5A, 0xA5, 0x09, 0x00, 0x00, 0x00, 0xAA, 0xEE]);
        let stop = CommandPacket::for_command(Command::Stop).encode();
        assert_eq!(stop[2], 0x06);
    }

    #[test]
    fn set_packet_carries_packet_config() {
        let packet = CommandPacket::for_command(Command::SetPacket);
        assert_eq!(packet.payload, PACKET_CONFIG);
        assert_eq!(CommandPacket::decode(&packet.encode()).unwrap(), packet);
    }

    #[test]
    fn decode_rejects_corrupt_envelopes() {
        let mut bytes = CommandPacket::for_command(Command::Start).encode();
        bytes[7] = 0x00;
        assert!(matches!(
            CommandPacket::decode(&bytes),
            Err(CaptureError::MalformedPacket(_))
        ));
        assert!(CommandPacket::decode(&[0x5A, 0xA5]).is_err());

        let unknown = [0x5A, 0xA5, 0x42, 0x00, 0x00, 0x00, 0xAA, 0xEE];
        assert!(CommandPacket::decode(&unknown).is_err());

        let mut short_length = CommandPacket::for_command(Command::SetFpga).encode();
        short_length[4] = 0x02;
        assert!(CommandPacket::decode(&short_length).is_err());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        assert!(matches!(
            CommandPacket::new(Command::Config, vec![0; 65_536]),
            Err(CaptureError::MalformedPacket(_))
        ));
        let largest = CommandPacket::new(Command::Config, vec![7; 65_535]).unwrap();
        let bytes = largest.encode();
        assert_eq!(&bytes[4..6], &[0xFF, 0xFF]);
        assert_eq!(CommandPacket::decode(&bytes).unwrap(), largest);
    }

    #[test]
    fn command_codes_round_trip_and_sequence_order() {
        for command in Command::ALL {
            assert_eq!(Command::from_code(command.code()), Some(command));
        }
        assert_eq!(Command::from_code(0x0F), None);
        let codes: Vec<u16> = STARTUP_SEQUENCE.iter().map(|c| c.code()).collect();
        assert_eq!(codes, vec![0x09, 0x0E, 0x03, 0x0B, 0x05]);
        assert_eq!(Command::GetVersion.to_string(), "GET_VERSION (0x0E)");
    }
}
