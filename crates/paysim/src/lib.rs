//! # Paysim
//!
//! An emulated payment terminal for exercising point-of-sale clients.
//!
//! Clients send `(cmd, req_id, args)` frames. The terminal answers every
//! readable frame with an ACK, then (unless it runs ACK-only, or the
//! command is unknown or an advice message) with a Result carrying
//! transaction ids, auth codes or session details. Two channels share one
//! terminal:
//!
//! - a WebSocket channel, where ACK and Result arrive as separate messages
//!   with a configurable delay in between
//! - an HTTP channel, one POST route per command, where both come back in
//!   a single `{"ack": ..., "result": ...}` body
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paysim::prelude::*;
//!
//! # async fn start() -> Result<(), PaysimError> {
//! let server = PaysimServer::builder()
//!     .http_bind("0.0.0.0:8000")
//!     .ws_bind("0.0.0.0:8001")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod http;
mod server;

pub use error::PaysimError;
pub use http::SERVICE_NAME;
pub use server::{PaysimServer, PaysimServerBuilder, ServerConfig};

/// Everything needed to start a server and talk about its messages.
pub mod prelude {
    pub use crate::{PaysimError, PaysimServer, PaysimServerBuilder, ServerConfig};
    pub use paysim_protocol::{
        Ack, AckStatus, Capabilities, CommandKind, ErrorEnvelope, Frame, ResultEnvelope,
        ResultStatus,
    };
    pub use paysim_session::{Clock, ManualClock, SystemClock};
    pub use paysim_terminal::{CommandProcessor, TerminalConfig};
}
