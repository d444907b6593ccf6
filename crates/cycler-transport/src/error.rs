use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
    #[error("channel name already in use: {0}")]
    ChannelInUse(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),
}
