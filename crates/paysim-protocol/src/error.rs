//! Error types for the protocol layer.
//!
//! Each Paysim crate defines its own error enum. A `ProtocolError` always
//! means bytes could not be turned into a frame (or an envelope into bytes);
//! a `CommandError` means the frame was readable but does not name a
//! command the terminal can run.

use crate::CommandKind;

/// Errors raised while encoding or decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an envelope into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a frame).
    ///
    /// Common causes: malformed JSON, a top-level value that is not an
    /// object, or an `args` field that is not an object.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

/// Errors raised while turning a decoded [`Frame`](crate::Frame) into a
/// typed [`Command`](crate::Command).
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The `cmd` field is not one of the names the terminal knows.
    #[error("unknown command: {0:?}")]
    Unknown(String),

    /// The command is known but its arguments have the wrong shape,
    /// e.g. `"amount": "ten"` on a Sale.
    #[error("invalid arguments for {cmd}: {source}")]
    InvalidArgs {
        cmd: CommandKind,
        #[source]
        source: serde_json::Error,
    },
}
