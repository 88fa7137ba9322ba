use std::time::Duration;

/// Errors that can occur in the transport layer.
///
/// Every variant describes a fault on ONE listener or connection. The
/// server logs these and moves on; none of them stop other connections.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The client connected but the WebSocket upgrade did not complete.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The client connected but never finished the WebSocket upgrade.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimedOut(Duration),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
