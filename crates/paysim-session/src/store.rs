//! The session store: every session the terminal knows about.
//!
//! # Concurrency note
//!
//! Unlike a store owned by a single task, `SessionStore` is shared by
//! every connection handler at once, so it guards its map with a
//! `std::sync::Mutex` and exposes `&self` methods only. No method holds
//! the lock across an `.await` (none of them are async), and every
//! multi-step mutation of one session (expire check, activity touch,
//! transaction append) happens under a single lock acquisition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use paysim_protocol::CommandKind;

use crate::{Clock, Session, SessionConfig, SystemClock, TransactionRecord};

/// Thread-safe registry of terminal sessions with sliding idle expiration.
///
/// ## Lifecycle
///
/// ```text
/// create() ──→ [active] ──get()/record_transaction()──→ [active]
///                  │                                        │
///                  │ end()                idle > timeout    │
///                  ▼                                        ▼
///             [inactive] ◀──────────────────────────────────┘
///                  │
///                  ▼ sweep()
///              (removed)
/// ```
///
/// None of the operations fail. Absence is reported as `None` / `false`.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    config: SessionConfig,
    /// `config.idle_timeout` converted once for timestamp arithmetic.
    idle_timeout: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Creates an empty store that reads time from the system clock.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty store that reads time from `clock`.
    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let idle_timeout =
            TimeDelta::from_std(config.idle_timeout).unwrap_or(TimeDelta::MAX);
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
            idle_timeout,
            clock,
        }
    }

    /// Returns the configuration this store was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Creates a new active session, replacing any session with the same id.
    ///
    /// Returns a snapshot of the new session.
    pub fn create(&self, session_id: &str, user: &str) -> Session {
        let now = self.clock.now();
        let session = Session::new(session_id.to_string(), user.to_string(), now);

        let replaced = self
            .lock()
            .insert(session_id.to_string(), session.clone())
            .is_some();

        tracing::info!(session_id, user, replaced, "session created");
        session
    }

    /// Looks up an active session and refreshes its activity timestamp.
    ///
    /// A session idle for exactly the timeout is still returned; one idle
    /// for longer is marked inactive and `None` is returned.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let now = self.clock.now();
        let mut sessions = self.lock();
        self.resolve(&mut sessions, session_id, now).map(|s| s.clone())
    }

    /// Resolves a session like [`get`](Self::get) and, if it is live,
    /// appends a transaction record to it under the same lock.
    ///
    /// Returns `true` if the record was stored.
    pub fn record_transaction(
        &self,
        session_id: &str,
        txn_id: &str,
        command: CommandKind,
        amount: f64,
    ) -> bool {
        let now = self.clock.now();
        let mut sessions = self.lock();
        match self.resolve(&mut sessions, session_id, now) {
            Some(session) => {
                session.push_transaction(TransactionRecord {
                    txn_id: txn_id.to_string(),
                    command,
                    amount,
                    timestamp: now,
                });
                tracing::debug!(session_id, txn_id, %command, "transaction recorded");
                true
            }
            None => false,
        }
    }

    /// Marks a session inactive.
    ///
    /// Returns `true` if a session with this id exists (active or not).
    pub fn end(&self, session_id: &str) -> bool {
        match self.lock().get_mut(session_id) {
            Some(session) => {
                session.deactivate();
                tracing::info!(session_id, "session ended");
                true
            }
            None => false,
        }
    }

    /// Removes every session that is inactive or idle past the timeout.
    ///
    /// Call this periodically to bound memory. Returns how many sessions
    /// were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.lock();
        let before = sessions.len();

        // `retain` keeps only entries where the closure returns `true`.
        sessions.retain(|_, session| {
            session.active && session.idle_for(now) <= self.idle_timeout
        });

        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, remaining = sessions.len(), "swept sessions");
        }
        removed
    }

    /// Returns the number of stored sessions (active or not yet swept).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Finds a live session in an already-locked map, expiring it if it
    /// has been idle too long and touching it otherwise.
    fn resolve<'a>(
        &self,
        sessions: &'a mut HashMap<String, Session>,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a mut Session> {
        let session = sessions.get_mut(session_id)?;
        if !session.active {
            return None;
        }
        if session.idle_for(now) > self.idle_timeout {
            session.deactivate();
            tracing::debug!(session_id, "session expired (idle timeout)");
            return None;
        }
        session.touch(now);
        Some(session)
    }

    /// A panic while holding the lock cannot leave a session half-written
    /// (every mutation is a single field store or push), so a poisoned
    /// lock is safe to keep using.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =========================================================================
// Tests
// =========================================================================
