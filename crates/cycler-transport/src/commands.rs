use crate::{CanFilter, CanFrame, ScpiSerialConf};
use serde::{Deserialize, Serialize};

/// Commands accepted by the CAN sniffer on its shared transmit channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CanCmd {
    AddFilter(CanFilter),
    RemoveFilter(CanFilter),
    Message(CanFrame),
}

/// Commands accepted by the SCPI sniffer on its shared transmit channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScpiCmd {
    /// Attach a serial device and bind its replies to the named channel.
    AddDev {
        port: String,
        rx_chan: String,
        conf: ScpiSerialConf,
    },
    /// Write an ASCII command and read back the device's answer.
    WriteRead { port: String, payload: String },
    /// Detach a serial device, releasing its port and bound channel.
    DelDev { port: String },
}

/// One answer from an attached SCPI device, delivered on its bound channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScpiReply {
    pub port: String,
    pub lines: Vec<String>,
}
