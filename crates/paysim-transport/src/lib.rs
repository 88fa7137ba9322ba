//! Transport layer for Paysim's persistent channel.
//!
//! Terminal clients keep one socket open and push command frames down it;
//! the emulator pushes ACKs, Results and error envelopes back. This crate
//! only moves whole messages as bytes. Turning them into frames is the
//! protocol crate's job.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket channel via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    DEFAULT_HANDSHAKE_TIMEOUT, WebSocketConnection, WebSocketHandshake, WebSocketTransport,
};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique number for a client connection. Shows up in log lines
/// as `conn-<n>` so one client's traffic can be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next id. Ids start at 1 and only grow.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener that hands out client connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Handshake: Handshake<Connection = Self::Connection, Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client socket.
    ///
    /// Returns as soon as the socket is accepted, before any upgrade.
    /// Finish the upgrade with [`Handshake::complete`], off the accept
    /// loop. An error concerns only the client being accepted; callers
    /// keep accepting.
    async fn accept(&mut self) -> Result<Self::Handshake, Self::Error>;

    /// The bound address. Useful after binding to port 0.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// A client socket that is connected but not yet upgraded.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    fn peer_addr(&self) -> SocketAddr;

    /// Runs the upgrade. Gives up once the transport's handshake timeout
    /// elapses.
    async fn complete(self) -> Result<Self::Connection, Self::Error>;
}

/// One client's channel. Messages keep their boundaries.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    async fn send(&self, message: &[u8]) -> Result<(), Self::Error>;

    /// Next message from the client, or `Ok(None)` once it has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}
