//! Codec trait and the JSON implementation used by every transport.
//!
//! The transports only move bytes. A [`Codec`] is what turns those bytes
//! into a [`Frame`](crate::Frame) and turns outbound envelopes back into
//! bytes, so the WebSocket handler and the HTTP adapter share one
//! definition of the wire format.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a single codec value lives in the
/// shared server state and is used from every connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Terminal clients (browser consoles, mobile SDK test harnesses) all
/// speak JSON, so this is the only codec the server wires in.
///
/// ## Example
///
/// ```rust
/// use paysim_protocol::{Codec, Frame, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame: Frame = codec
///     .decode(br#"{"cmd":"Sale","req_id":"r-1","args":{"amount":12.5}}"#)
///     .unwrap();
/// assert_eq!(frame.cmd, "Sale");
/// assert_eq!(frame.req_id, "r-1");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
