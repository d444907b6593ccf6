//! cycler-transport: channel boundary to the CAN and SCPI sniffers
//!
//! The battery cycler talks to its instruments through two sniffer processes:
//! one bridging the CAN bus and one multiplexing SCPI-over-serial devices.
//! This crate defines the command and frame types exchanged with them and the
//! channel traits the detection engine is written against. The default build
//! enables a `mock` backend so that binaries and tests compile on any host
//! without the real IPC transport.

mod types;
pub use types::{CanFilter, CanFrame, Parity, ScpiSerialConf};

mod commands;
pub use commands::{CanCmd, ScpiCmd, ScpiReply};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::{CanLink, ScpiLink, ScpiRx};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockCanLink, MockScpiLink, MockScpiRx};
