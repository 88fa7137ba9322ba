//! The emulated payment terminal.
//!
//! Everything a terminal does once a frame has been decoded lives here:
//! deciding whether to accept it, generating transaction and session
//! identifiers, touching the session store, and building Result
//! envelopes. Transports own the sockets and the timing; this crate owns
//! the answers.
//!
//! # Key types
//!
//! - [`CommandProcessor`]: accepts frames and processes commands
//! - [`Accepted`]: what the first (ACK) phase decided about a frame
//! - [`IdGenerator`]: transaction ids, auth codes, session ids
//! - [`TerminalConfig`]: timeout, ACK-only mode, delay, capabilities

mod config;
mod ids;
mod processor;

pub use config::TerminalConfig;
pub use ids::IdGenerator;
pub use paysim_protocol::Capabilities;
pub use processor::{Accepted, CommandProcessor};
