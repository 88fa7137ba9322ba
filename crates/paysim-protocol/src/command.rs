//! Typed commands.
//!
//! A [`Frame`](crate::Frame) carries the command name as a string and its
//! arguments as a loose JSON object. This module turns that pair into a
//! [`Command`]: one variant per command the terminal understands, each
//! carrying its own argument struct. Defaults that the terminal applies
//! for missing keys (`user = "default"`, `amount = 0`, ...) live on the
//! argument structs, so the processor never looks keys up by name.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CommandError;

// ---------------------------------------------------------------------------
// Command names
// ---------------------------------------------------------------------------

/// The nine commands the terminal processes.
///
/// Serializes as the bare PascalCase name (`"Sale"`, `"AutoReversal"`),
/// which is exactly what clients put in the `cmd` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Login,
    Logout,
    Sale,
    Refund,
    Reversal,
    Cancellation,
    Completion,
    AutoReversal,
    Loyalty,
}

impl CommandKind {
    /// Every known command, in protocol documentation order.
    pub const ALL: [CommandKind; 9] = [
        Self::Login,
        Self::Logout,
        Self::Sale,
        Self::Refund,
        Self::Reversal,
        Self::Cancellation,
        Self::Completion,
        Self::AutoReversal,
        Self::Loyalty,
    ];

    /// Returns the wire name of this command.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::Logout => "Logout",
            Self::Sale => "Sale",
            Self::Refund => "Refund",
            Self::Reversal => "Reversal",
            Self::Cancellation => "Cancellation",
            Self::Completion => "Completion",
            Self::AutoReversal => "AutoReversal",
            Self::Loyalty => "Loyalty",
        }
    }

    /// Looks a command up by its exact (case-sensitive) wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advice messages: the client's answer to an earlier terminal result.
///
/// The terminal acknowledges these and does nothing else. They never get
/// a Result envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdviceKind {
    PaymentResponse,
    CompletionResponse,
    LoyaltyResponse,
}

impl AdviceKind {
    pub const ALL: [AdviceKind; 3] = [
        Self::PaymentResponse,
        Self::CompletionResponse,
        Self::LoyaltyResponse,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PaymentResponse => "PaymentResponse",
            Self::CompletionResponse => "CompletionResponse",
            Self::LoyaltyResponse => "LoyaltyResponse",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Argument structs
// ---------------------------------------------------------------------------

fn default_user() -> String {
    "default".to_string()
}

fn default_reversal_reason() -> String {
    "network_error".to_string()
}

fn default_loyalty_action() -> String {
    "enquiry".to_string()
}

/// Arguments of `Login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginArgs {
    #[serde(default = "default_user")]
    pub user: String,
}

impl Default for LoginArgs {
    fn default() -> Self {
        Self { user: default_user() }
    }
}

/// Arguments of `Logout`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogoutArgs {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Arguments of `Sale`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleArgs {
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Arguments of `Refund`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefundArgs {
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub original_txn_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Arguments shared by `Reversal`, `Cancellation` and `Completion`: the
/// transaction being acted on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxnRefArgs {
    #[serde(default)]
    pub txn_id: Option<String>,
}

/// Arguments of `AutoReversal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoReversalArgs {
    #[serde(default)]
    pub txn_id: Option<String>,
    #[serde(default = "default_reversal_reason")]
    pub reason: String,
}

impl Default for AutoReversalArgs {
    fn default() -> Self {
        Self {
            txn_id: None,
            reason: default_reversal_reason(),
        }
    }
}

/// Arguments of `Loyalty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyArgs {
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default = "default_loyalty_action")]
    pub action: String,
}

impl Default for LoyaltyArgs {
    fn default() -> Self {
        Self {
            card_number: None,
            action: default_loyalty_action(),
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A decoded command with typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login(LoginArgs),
    Logout(LogoutArgs),
    Sale(SaleArgs),
    Refund(RefundArgs),
    Reversal(TxnRefArgs),
    Cancellation(TxnRefArgs),
    Completion(TxnRefArgs),
    AutoReversal(AutoReversalArgs),
    Loyalty(LoyaltyArgs),
}

impl Command {
    /// Builds a command of the given kind from a raw argument object.
    ///
    /// Unknown keys are ignored; missing keys take their defaults.
    ///
    /// # Errors
    /// Returns [`CommandError::InvalidArgs`] when a present key has the
    /// wrong JSON type.
    pub fn from_args(
        kind: CommandKind,
        args: Map<String, Value>,
    ) -> Result<Self, CommandError> {
        let args = Value::Object(args);
        let invalid = |source| CommandError::InvalidArgs { cmd: kind, source };

        let command = match kind {
            CommandKind::Login => {
                Self::Login(serde_json::from_value(args).map_err(invalid)?)
            }
            CommandKind::Logout => {
                Self::Logout(serde_json::from_value(args).map_err(invalid)?)
            }
            CommandKind::Sale => {
                Self::Sale(serde_json::from_value(args).map_err(invalid)?)
            }
            CommandKind::Refund => {
                Self::Refund(serde_json::from_value(args).map_err(invalid)?)
            }
            CommandKind::Reversal => {
                Self::Reversal(serde_json::from_value(args).map_err(invalid)?)
            }
            CommandKind::Cancellation => Self::Cancellation(
                serde_json::from_value(args).map_err(invalid)?,
            ),
            CommandKind::Completion => {
                Self::Completion(serde_json::from_value(args).map_err(invalid)?)
            }
            CommandKind::AutoReversal => Self::AutoReversal(
                serde_json::from_value(args).map_err(invalid)?,
            ),
            CommandKind::Loyalty => {
                Self::Loyalty(serde_json::from_value(args).map_err(invalid)?)
            }
        };
        Ok(command)
    }

    /// Returns which command this is.
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Login(_) => CommandKind::Login,
            Self::Logout(_) => CommandKind::Logout,
            Self::Sale(_) => CommandKind::Sale,
            Self::Refund(_) => CommandKind::Refund,
            Self::Reversal(_) => CommandKind::Reversal,
            Self::Cancellation(_) => CommandKind::Cancellation,
            Self::Completion(_) => CommandKind::Completion,
            Self::AutoReversal(_) => CommandKind::AutoReversal,
            Self::Loyalty(_) => CommandKind::Loyalty,
        }
    }
}

/// What an inbound frame turned out to be once its name was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A command the terminal processes.
    Command(Command),
    /// An advice message: acknowledge, never process.
    Advice(AdviceKind),
}
