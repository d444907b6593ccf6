use cycler_transport::TransportError;
use thiserror::Error;

/// Failures that abort a detection cycle. Per-candidate problems (malformed
/// replies, unknown addresses, missing directories) never surface here; the
/// only fatal path is losing the shared sniffer channels themselves.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}
