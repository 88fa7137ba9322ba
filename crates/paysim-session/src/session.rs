//! Session types: the server's record of a logged-in terminal user.
//!
//! A session tracks:
//! - WHO logged in (`user`) and under which id
//! - WHEN it was created and last used (for idle expiration)
//! - WHETHER it is still usable (`active`, flips to `false` exactly once)
//! - WHAT was done in it (the transaction history)

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use paysim_protocol::CommandKind;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a session may sit unused before it expires.
    ///
    /// Every successful lookup restarts this window (sliding expiration).
    /// Default: 30 minutes.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionRecord
// ---------------------------------------------------------------------------

/// One money-moving command performed inside a session.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub txn_id: String,
    pub command: CommandKind,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single terminal session.
///
/// ```text
///   active ──(idle timeout | logout)──→ inactive ──(sweep)──→ removed
/// ```
///
/// There is no way back from inactive: a user who wants to continue has
/// to log in again and gets a new session.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
    /// Never earlier than `created_at`.
    pub last_activity: DateTime<Utc>,
    pub active: bool,
    /// Ordered oldest first.
    pub transactions: Vec<TransactionRecord>,
}

impl Session {
    pub(crate) fn new(session_id: String, user: String, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            user,
            created_at: now,
            last_activity: now,
            active: true,
            transactions: Vec::new(),
        }
    }

    /// How long the session has gone without activity as of `now`.
    pub fn idle_for(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.last_activity
    }

    /// Records activity at `now`. A clock that went backwards leaves the
    /// timestamp where it was.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    pub(crate) fn push_transaction(&mut self, record: TransactionRecord) {
        self.transactions.push(record);
    }
}
