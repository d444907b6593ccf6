use core::fmt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A CAN data frame as carried by the sniffer (classic CAN, 11-bit ids).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CanFrame {
    pub addr: u16,
    pub len: u8,
    pub data: [u8; 8],
}

impl CanFrame {
    /// Build a frame, rejecting out-of-range ids and oversized payloads.
    pub fn new(addr: u16, data: &[u8]) -> Option<Self> {
        if addr > 0x7FF || data.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            addr,
            len: data.len() as u8,
            data: buf,
        })
    }

    /// The payload bytes actually carried (`len` of the 8-byte buffer).
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.len.min(8))]
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{addr:03X} [{len}]", addr = self.addr, len = self.len)
    }
}

/// Acceptance filter registered on the CAN sniffer; matching frames are
/// delivered on the named receive channel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CanFilter {
    pub addr: u16,
    pub mask: u16,
    pub rx_chan: String,
}

/// Serial parity setting forwarded to the SCPI sniffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

/// Serial line configuration for one SCPI device. This is a command payload:
/// the sniffer process owns the port, the engine never opens it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScpiSerialConf {
    pub port: String,
    pub baudrate: u32,
    pub parity: Parity,
    pub separator: char,
    pub timeout: Duration,
    pub write_timeout: Duration,
}
