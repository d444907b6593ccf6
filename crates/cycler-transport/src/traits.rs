use crate::{CanCmd, CanFrame, Result, ScpiCmd, ScpiReply};

/// Command/receive pair towards the CAN sniffer.
///
/// `send` is fire-and-forget; delivery to the bus is the sniffer's problem.
/// `try_recv` polls the receive channel registered via `CanCmd::AddFilter`
/// and never blocks.
pub trait CanLink {
    fn send(&mut self, cmd: CanCmd) -> Result<()>;

    /// Next pending frame, if any.
    fn try_recv(&mut self) -> Result<Option<CanFrame>>;
}

/// Command channel towards the SCPI sniffer plus per-device reply channels.
pub trait ScpiLink {
    type Rx: ScpiRx;

    fn send(&mut self, cmd: ScpiCmd) -> Result<()>;

    /// Open an exclusive, uniquely named reply channel. The name is then
    /// handed to the sniffer in `ScpiCmd::AddDev` so it knows where to route
    /// the device's answers. Opening a name twice is an error.
    fn open_rx(&mut self, chan_name: &str) -> Result<Self::Rx>;
}

/// Non-blocking receive side of one per-device reply channel.
pub trait ScpiRx {
    fn try_recv(&mut self) -> Result<Option<ScpiReply>>;
}
