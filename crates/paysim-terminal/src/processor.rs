//! The command processor: the terminal's brain.
//!
//! Every request goes through two phases:
//!
//! ```text
//! RECEIVED ──accept()──→ ACK ──process()──→ RESULT
//!                         │
//!                         └── unknown / advice / ACK-only: stop here
//! ```
//!
//! [`CommandProcessor::accept`] is the first phase. It never touches the
//! session store, so a transport can send the ACK immediately. The second
//! phase, [`CommandProcessor::process`], does the actual work and is only
//! run when [`CommandProcessor::is_verbose`] says Results are wanted.
//! Waiting between the two phases is the transport's job.

use std::sync::Arc;
use std::time::Duration;

use paysim_protocol::{
    Ack, AckStatus, AutoReversalArgs, Capabilities, Command, CommandError,
    CommandKind, Frame, Inbound, LoginArgs, LogoutArgs, LoyaltyArgs,
    RefundArgs, ResultEnvelope, ResultPayload, ResultStatus, SaleArgs,
    TxnRefArgs,
};
use paysim_session::{Clock, SessionStore, SystemClock};

use crate::{IdGenerator, TerminalConfig};

/// Points reported for every loyalty enquiry.
const LOYALTY_POINTS: u32 = 1000;

/// What the ACK phase decided about a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Accepted {
    /// Unknown command name. Rejected ACK, nothing follows.
    Rejected(Ack),

    /// Advice message. Accepted ACK, nothing follows.
    Advice(Ack),

    /// Known command whose arguments have the wrong type. Accepted ACK
    /// followed by a failed Result (unless the terminal is ACK-only).
    Invalid { ack: Ack, result: ResultEnvelope },

    /// Known command ready for [`CommandProcessor::process`].
    Command { ack: Ack, command: Command },
}

impl Accepted {
    /// The ACK to send, whatever the outcome.
    pub fn ack(&self) -> &Ack {
        match self {
            Self::Rejected(ack) | Self::Advice(ack) => ack,
            Self::Invalid { ack, .. } | Self::Command { ack, .. } => ack,
        }
    }
}

/// Turns decoded frames into ACKs and commands into Results.
///
/// Built once at startup and shared (`Arc<CommandProcessor>`) by every
/// transport adapter. All methods take `&self`.
pub struct CommandProcessor {
    config: TerminalConfig,
    sessions: SessionStore,
    ids: IdGenerator,
    clock: Arc<dyn Clock>,
}

impl CommandProcessor {
    /// Creates a processor that reads the system clock.
    pub fn new(config: TerminalConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a processor whose session store, identifier generator and
    /// Result timestamps all read time from `clock`.
    pub fn with_clock(config: TerminalConfig, clock: Arc<dyn Clock>) -> Self {
        let sessions = SessionStore::with_clock(config.session_config(), clock.clone());
        let ids = IdGenerator::with_clock(clock.clone());
        Self {
            config,
            sessions,
            ids,
            clock,
        }
    }

    /// Replaces the identifier generator.
    pub fn with_ids(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.config.capabilities
    }

    /// The session store, for sweeping and inspection.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Pause the transport should insert between ACK and Result.
    pub fn response_delay(&self) -> Duration {
        self.config.response_delay
    }

    /// `true` unless the terminal runs in ACK-only mode.
    pub fn is_verbose(&self) -> bool {
        !self.config.ack_only
    }

    /// Builds an ACK. `cmd` is echoed verbatim.
    pub fn create_ack(&self, req_id: &str, cmd: &str, accepted: bool) -> Ack {
        Ack {
            req_id: req_id.to_string(),
            cmd: cmd.to_string(),
            status: if accepted {
                AckStatus::Accepted
            } else {
                AckStatus::Rejected
            },
        }
    }

    /// Runs the ACK phase for a decoded frame.
    pub fn accept(&self, frame: &Frame) -> Accepted {
        let req_id = frame.req_id.as_str();
        match frame.parse() {
            Ok(Inbound::Command(command)) => {
                tracing::debug!(req_id, cmd = %command.kind(), "command accepted");
                Accepted::Command {
                    ack: self.create_ack(req_id, &frame.cmd, true),
                    command,
                }
            }
            Ok(Inbound::Advice(kind)) => {
                tracing::debug!(req_id, advice = %kind, "advice acknowledged");
                Accepted::Advice(self.create_ack(req_id, &frame.cmd, true))
            }
            Err(CommandError::Unknown(name)) => {
                tracing::warn!(req_id, cmd = %name, "unknown command rejected");
                Accepted::Rejected(self.create_ack(req_id, &frame.cmd, false))
            }
            Err(CommandError::InvalidArgs { cmd, source }) => {
                tracing::warn!(req_id, %cmd, error = %source, "invalid arguments");
                Accepted::Invalid {
                    ack: self.create_ack(req_id, &frame.cmd, true),
                    result: self.fail(req_id, cmd, "invalid_args", source.to_string()),
                }
            }
        }
    }

    /// Runs the Result phase for an accepted command.
    pub fn process(&self, req_id: &str, command: &Command) -> ResultEnvelope {
        match command {
            Command::Login(args) => self.login(req_id, args),
            Command::Logout(args) => self.logout(req_id, args),
            Command::Sale(args) => self.sale(req_id, args),
            Command::Refund(args) => self.refund(req_id, args),
            Command::Reversal(args) => self.reversal(req_id, args),
            Command::Cancellation(args) => self.cancellation(req_id, args),
            Command::Completion(args) => self.completion(req_id, args),
            Command::AutoReversal(args) => self.auto_reversal(req_id, args),
            Command::Loyalty(args) => self.loyalty(req_id, args),
        }
    }

    /// Builds a failed Result.
    pub fn fail(
        &self,
        req_id: &str,
        cmd: CommandKind,
        reason: &str,
        detail: impl Into<String>,
    ) -> ResultEnvelope {
        self.envelope(
            req_id,
            cmd,
            ResultStatus::Fail,
            ResultPayload::Failure {
                reason: reason.to_string(),
                detail: detail.into(),
            },
        )
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Opens a new session for `args.user`.
    pub fn login(&self, req_id: &str, args: &LoginArgs) -> ResultEnvelope {
        let session_id = self.ids.session_id();
        self.sessions.create(&session_id, &args.user);
        self.success(
            req_id,
            CommandKind::Login,
            ResultPayload::Login {
                user: args.user.clone(),
                session_id,
                capabilities: self.config.capabilities.clone(),
            },
        )
    }

    /// Ends the named session. Succeeds even if there is nothing to end.
    pub fn logout(&self, req_id: &str, args: &LogoutArgs) -> ResultEnvelope {
        if let Some(session_id) = &args.session_id {
            self.sessions.end(session_id);
        }
        self.success(req_id, CommandKind::Logout, ResultPayload::Empty {})
    }

    /// Approves a sale and, if the session is live, records it there.
    pub fn sale(&self, req_id: &str, args: &SaleArgs) -> ResultEnvelope {
        let txn_id = self.ids.next_transaction_id("T");
        let auth_code = self.ids.next_auth_code();
        self.record(args.session_id.as_deref(), &txn_id, CommandKind::Sale, args.amount);
        self.success(
            req_id,
            CommandKind::Sale,
            ResultPayload::Sale {
                txn_id,
                auth_code,
                amount: args.amount,
            },
        )
    }

    /// Approves a refund and, if the session is live, records it there.
    pub fn refund(&self, req_id: &str, args: &RefundArgs) -> ResultEnvelope {
        let txn_id = self.ids.next_transaction_id("R");
        self.record(args.session_id.as_deref(), &txn_id, CommandKind::Refund, args.amount);
        self.success(
            req_id,
            CommandKind::Refund,
            ResultPayload::Refund {
                txn_id,
                original_txn_id: args.original_txn_id.clone(),
                amount: args.amount,
            },
        )
    }

    pub fn reversal(&self, req_id: &str, args: &TxnRefArgs) -> ResultEnvelope {
        self.echo_txn(req_id, CommandKind::Reversal, args)
    }

    pub fn cancellation(&self, req_id: &str, args: &TxnRefArgs) -> ResultEnvelope {
        self.echo_txn(req_id, CommandKind::Cancellation, args)
    }

    pub fn completion(&self, req_id: &str, args: &TxnRefArgs) -> ResultEnvelope {
        self.echo_txn(req_id, CommandKind::Completion, args)
    }

    pub fn auto_reversal(&self, req_id: &str, args: &AutoReversalArgs) -> ResultEnvelope {
        self.success(
            req_id,
            CommandKind::AutoReversal,
            ResultPayload::AutoReversal {
                txn_id: args.txn_id.clone(),
                reason: args.reason.clone(),
            },
        )
    }

    /// Points are only reported for `action == "enquiry"`.
    pub fn loyalty(&self, req_id: &str, args: &LoyaltyArgs) -> ResultEnvelope {
        let points = (args.action == "enquiry").then_some(LOYALTY_POINTS);
        self.success(
            req_id,
            CommandKind::Loyalty,
            ResultPayload::Loyalty {
                action: args.action.clone(),
                points,
            },
        )
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn record(&self, session_id: Option<&str>, txn_id: &str, cmd: CommandKind, amount: f64) {
        let Some(session_id) = session_id else {
            return;
        };
        if !self.sessions.record_transaction(session_id, txn_id, cmd, amount) {
            tracing::debug!(session_id, txn_id, %cmd, "no live session, transaction not recorded");
        }
    }

    fn echo_txn(&self, req_id: &str, cmd: CommandKind, args: &TxnRefArgs) -> ResultEnvelope {
        self.success(
            req_id,
            cmd,
            ResultPayload::TxnRef {
                txn_id: args.txn_id.clone(),
            },
        )
    }

    fn success(&self, req_id: &str, cmd: CommandKind, payload: ResultPayload) -> ResultEnvelope {
        self.envelope(req_id, cmd, ResultStatus::Success, payload)
    }

    fn envelope(
        &self,
        req_id: &str,
        cmd: CommandKind,
        status: ResultStatus,
        payload: ResultPayload,
    ) -> ResultEnvelope {
        ResultEnvelope {
            req_id: req_id.to_string(),
            cmd,
            status,
            payload,
            ts: self.clock.now(),
        }
    }
}
