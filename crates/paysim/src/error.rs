//! Unified error type for the Paysim server.

use paysim_protocol::ProtocolError;
use paysim_transport::TransportError;

/// Top-level error that wraps the crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors. Command
/// and session problems never show up here: those are answered in-band
/// with a rejected ACK or a failed Result.
#[derive(Debug, thiserror::Error)]
pub enum PaysimError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An I/O error outside the WebSocket transport, e.g. binding the
    /// HTTP listener.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
