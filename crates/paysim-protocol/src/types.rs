//! Wire types for the terminal protocol.
//!
//! Every exchange is one inbound [`Frame`] answered by up to two outbound
//! envelopes:
//!
//! ```text
//! client ──Frame──────────────▶ terminal
//! client ◀──────────────Ack──── terminal   (always, first)
//! client ◀───────────Result──── terminal   (verbose mode only, second)
//! ```
//!
//! If the frame cannot be read at all, the terminal answers with an
//! [`ErrorEnvelope`] instead of an ACK.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{AdviceKind, Command, CommandError, CommandKind, Inbound};

// ---------------------------------------------------------------------------
// Inbound frame
// ---------------------------------------------------------------------------

/// An inbound message, decoded into the `(cmd, req_id, args)` triple.
///
/// Decoding is deliberately lenient: a missing `cmd` or `req_id` becomes
/// the empty string, a numeric `req_id` is stringified, and a missing or
/// `null` `args` becomes an empty object. Only input that is not a JSON
/// object of this shape fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, deserialize_with = "lenient_string")]
    pub cmd: String,

    /// Opaque caller-chosen correlation id, echoed in every response.
    #[serde(default, deserialize_with = "lenient_string")]
    pub req_id: String,

    #[serde(default, deserialize_with = "object_or_empty")]
    pub args: Map<String, Value>,
}

impl Frame {
    /// Creates a frame from its parts.
    pub fn new(
        cmd: impl Into<String>,
        req_id: impl Into<String>,
        args: Map<String, Value>,
    ) -> Self {
        Self {
            cmd: cmd.into(),
            req_id: req_id.into(),
            args,
        }
    }

    /// Resolves the command name and types the arguments.
    ///
    /// # Errors
    /// - [`CommandError::Unknown`] if `cmd` names neither a command nor
    ///   an advice message.
    /// - [`CommandError::InvalidArgs`] if the command is known but an
    ///   argument has the wrong type.
    pub fn parse(&self) -> Result<Inbound, CommandError> {
        if let Some(kind) = CommandKind::from_name(&self.cmd) {
            let command = Command::from_args(kind, self.args.clone())?;
            return Ok(Inbound::Command(command));
        }
        if let Some(advice) = AdviceKind::from_name(&self.cmd) {
            return Ok(Inbound::Advice(advice));
        }
        Err(CommandError::Unknown(self.cmd.clone()))
    }
}

/// Accepts any JSON scalar and turns it into a trimmed string.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    })
}

fn object_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// ACK
// ---------------------------------------------------------------------------

/// Whether the terminal accepted a command for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Accepted,
    Rejected,
}

/// First-phase response. Sent for every decodable frame.
///
/// `#[serde(tag = "type", rename = "ack")]` puts `"type": "ack"` into the
/// JSON object so clients can tell envelopes apart on a shared channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "ack")]
pub struct Ack {
    pub req_id: String,
    /// The inbound command name, echoed verbatim (even when unknown).
    pub cmd: String,
    pub status: AckStatus,
}

impl Ack {
    pub fn is_accepted(&self) -> bool {
        self.status == AckStatus::Accepted
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Outcome of processing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Fail,
}

/// Card-reading features the emulated terminal advertises on Login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub emv: bool,
    pub contactless: bool,
    pub magstripe: bool,
    pub version: String,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            emv: true,
            contactless: true,
            magstripe: true,
            version: "1.0".to_string(),
        }
    }
}

/// Command-specific fields of a Result envelope.
///
/// `#[serde(untagged)]` plus `#[serde(flatten)]` on the envelope field
/// means the variant's fields appear directly next to `req_id`, `cmd`
/// and `status`, with no wrapper object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Login {
        user: String,
        session_id: String,
        capabilities: Capabilities,
    },
    Sale {
        txn_id: String,
        auth_code: String,
        amount: f64,
    },
    Refund {
        txn_id: String,
        original_txn_id: Option<String>,
        amount: f64,
    },
    /// Reversal, Cancellation and Completion echo the referenced id.
    TxnRef { txn_id: Option<String> },
    AutoReversal {
        txn_id: Option<String>,
        reason: String,
    },
    Loyalty {
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        points: Option<u32>,
    },
    /// No extra fields (Logout).
    Empty {},
    /// Processing failed; `status` is `fail`.
    Failure { reason: String, detail: String },
}

/// Second-phase response carrying the outcome of a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "result")]
pub struct ResultEnvelope {
    pub req_id: String,
    pub cmd: CommandKind,
    pub status: ResultStatus,
    #[serde(flatten)]
    pub payload: ResultPayload,
    /// When the result was generated (RFC 3339, UTC).
    pub ts: DateTime<Utc>,
}

impl ResultEnvelope {
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// In-band signal that an inbound message could not be decoded.
///
/// Distinct from a rejected ACK: a rejected ACK means "I read your frame
/// and don't know that command"; an error envelope means "I could not
/// read your frame at all".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "error")]
pub struct ErrorEnvelope {
    pub reason: String,
    pub detail: String,
}

impl ErrorEnvelope {
    /// The envelope sent when a message is not a valid JSON frame.
    pub fn invalid_json(detail: impl Into<String>) -> Self {
        Self {
            reason: "invalid_json".to_string(),
            detail: detail.into(),
        }
    }
}

/// Any envelope the terminal can send.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Ack(Ack),
    Result(ResultEnvelope),
    Error(ErrorEnvelope),
}

impl From<Ack> for Outbound {
    fn from(ack: Ack) -> Self {
        Self::Ack(ack)
    }
}

impl From<ResultEnvelope> for Outbound {
    fn from(result: ResultEnvelope) -> Self {
        Self::Result(result)
    }
}

impl From<ErrorEnvelope> for Outbound {
    fn from(error: ErrorEnvelope) -> Self {
        Self::Error(error)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The JSON shapes here are what client SDKs parse, so most tests
    //! assert on field names and values rather than round-trips.

    use super::*;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    // =====================================================================
    // Frame decoding
    // =====================================================================

    #[test]
    fn test_frame_decodes_full_triple() {
        let frame: Frame = serde_json::from_value(json!({
            "cmd": "Sale",
            "req_id": "abc",
            "args": {"amount": 5}
        }))
        .unwrap();
        assert_eq!(frame.cmd, "Sale");
        assert_eq!(frame.req_id, "abc");
        assert_eq!(frame.args["amount"], 5);
    }

    #[test]
    fn test_frame_missing_fields_default_to_empty() {
        let frame: Frame = serde_json::from_str("{}").unwrap();
        assert_eq!(frame.cmd, "");
        assert_eq!(frame.req_id, "");
        assert!(frame.args.is_empty());
    }

    #[test]
    fn test_frame_null_args_become_empty_object() {
        let frame: Frame =
            serde_json::from_str(r#"{"cmd":"Login","req_id":"1","args":null}"#)
                .unwrap();
        assert!(frame.args.is_empty());
    }

    #[test]
    fn test_frame_numeric_req_id_is_stringified() {
        let frame: Frame =
            serde_json::from_str(r#"{"cmd":"Login","req_id":42}"#).unwrap();
        assert_eq!(frame.req_id, "42");
    }

    #[test]
    fn test_frame_trims_command_name() {
        let frame: Frame =
            serde_json::from_str(r#"{"cmd":"  Sale ","req_id":"1"}"#).unwrap();
        assert_eq!(frame.cmd, "Sale");
    }

    #[test]
    fn test_frame_non_object_args_fail_to_decode() {
        let result: Result<Frame, _> =
            serde_json::from_str(r#"{"cmd":"Sale","req_id":"1","args":[1,2]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_frame_top_level_array_fails_to_decode() {
        let result: Result<Frame, _> = serde_json::from_str("[1, 2, 3]");
        assert!(result.is_err());
    }

    // =====================================================================
    // Frame::parse
    // =====================================================================

    #[test]
    fn test_parse_known_command() {
        let frame = Frame::new("Logout", "r1", Map::new());
        let inbound = frame.parse().unwrap();
        assert!(matches!(inbound, Inbound::Command(Command::Logout(_))));
    }

    #[test]
    fn test_parse_advice_message() {
        let frame = Frame::new("LoyaltyResponse", "r1", Map::new());
        assert_eq!(
            frame.parse().unwrap(),
            Inbound::Advice(AdviceKind::LoyaltyResponse)
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        let frame = Frame::new("Frobnicate", "r1", Map::new());
        assert!(matches!(
            frame.parse(),
            Err(CommandError::Unknown(name)) if name == "Frobnicate"
        ));
    }

    #[test]
    fn test_parse_empty_command_is_unknown() {
        let frame = Frame::new("", "r1", Map::new());
        assert!(matches!(frame.parse(), Err(CommandError::Unknown(_))));
    }

    // =====================================================================
    // Envelopes
    // =====================================================================

    #[test]
    fn test_ack_json_format() {
        let ack = Ack {
            req_id: "r1".into(),
            cmd: "Frobnicate".into(),
            status: AckStatus::Rejected,
        };
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "ack",
                "req_id": "r1",
                "cmd": "Frobnicate",
                "status": "rejected"
            })
        );
    }

    #[test]
    fn test_ack_deserializes_from_wire() {
        let ack: Ack = serde_json::from_str(
            r#"{"type":"ack","req_id":"r1","cmd":"Sale","status":"accepted"}"#,
        )
        .unwrap();
        assert!(ack.is_accepted());
    }

    #[test]
    fn test_result_payload_is_flattened() {
        let result = ResultEnvelope {
            req_id: "r2".into(),
            cmd: CommandKind::Sale,
            status: ResultStatus::Success,
            payload: ResultPayload::Sale {
                txn_id: "T101".into(),
                auth_code: "004211".into(),
                amount: 12.5,
            },
            ts: ts(),
        };
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["type"], "result");
        assert_eq!(json["req_id"], "r2");
        assert_eq!(json["cmd"], "Sale");
        assert_eq!(json["status"], "success");
        assert_eq!(json["txn_id"], "T101");
        assert_eq!(json["auth_code"], "004211");
        assert_eq!(json["amount"], 12.5);
        assert!(json.get("payload").is_none());
        assert!(json["ts"].as_str().unwrap().starts_with("2026-01-02T03:04:05"));
    }

    #[test]
    fn test_result_login_nests_capabilities() {
        let result = ResultEnvelope {
            req_id: "r3".into(),
            cmd: CommandKind::Login,
            status: ResultStatus::Success,
            payload: ResultPayload::Login {
                user: "alice".into(),
                session_id: "sess_1".into(),
                capabilities: Capabilities::default(),
            },
            ts: ts(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json["capabilities"],
            json!({"emv": true, "contactless": true, "magstripe": true, "version": "1.0"})
        );
    }

    #[test]
    fn test_result_loyalty_omits_missing_points() {
        let result = ResultEnvelope {
            req_id: "r4".into(),
            cmd: CommandKind::Loyalty,
            status: ResultStatus::Success,
            payload: ResultPayload::Loyalty {
                action: "redeem".into(),
                points: None,
            },
            ts: ts(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["action"], "redeem");
        assert!(json.get("points").is_none());
    }

    #[test]
    fn test_result_empty_payload_adds_no_fields() {
        let result = ResultEnvelope {
            req_id: "r5".into(),
            cmd: CommandKind::Logout,
            status: ResultStatus::Success,
            payload: ResultPayload::Empty {},
            ts: ts(),
        };
        let json = serde_json::to_value(&result).unwrap();
        let mut keys: Vec<&str> =
            json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["cmd", "req_id", "status", "ts", "type"]);
    }

    #[test]
    fn test_error_envelope_json_format() {
        let json =
            serde_json::to_value(ErrorEnvelope::invalid_json("expected value"))
                .unwrap();
        assert_eq!(
            json,
            json!({
                "type": "error",
                "reason": "invalid_json",
                "detail": "expected value"
            })
        );
    }

    #[test]
    fn test_outbound_serializes_inner_envelope_unchanged() {
        let ack = Ack {
            req_id: "r1".into(),
            cmd: "Sale".into(),
            status: AckStatus::Accepted,
        };
        let direct = serde_json::to_value(&ack).unwrap();
        let wrapped = serde_json::to_value(Outbound::from(ack)).unwrap();
        assert_eq!(direct, wrapped);
    }
}
