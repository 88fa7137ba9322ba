//! Identifier generation.
//!
//! Transaction ids are a letter prefix plus a number from one shared
//! counter, so `T…` and `R…` ids interleave but never repeat. The counter
//! starts at the Unix time the generator was built, which keeps ids from
//! different runs roughly ordered without persisting anything.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use paysim_session::{Clock, SystemClock};

/// Produces transaction ids, authorization codes and session ids.
///
/// Safe to share between tasks; every method takes `&self`.
pub struct IdGenerator {
    counter: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl IdGenerator {
    /// Creates a generator seeded from the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a generator seeded from, and reading time from, `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let seed = unix_seconds(clock.as_ref());
        Self {
            counter: AtomicU64::new(seed),
            clock,
        }
    }

    /// Replaces the counter seed. The next transaction id is `seed + 1`.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            counter: AtomicU64::new(seed),
            clock: self.clock,
        }
    }

    /// Returns `prefix` followed by the next counter value.
    ///
    /// The counter is pre-incremented: a generator seeded with 100 hands
    /// out 101 first.
    pub fn next_transaction_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}{n}")
    }

    /// Six-digit code from the current second.
    ///
    /// Two calls within the same second return the same code.
    pub fn next_auth_code(&self) -> String {
        format!("{:06}", unix_seconds(self.clock.as_ref()) % 1_000_000)
    }

    /// `sess_<unix seconds>`.
    pub fn session_id(&self) -> String {
        format!("sess_{}", unix_seconds(self.clock.as_ref()))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_seconds(clock: &dyn Clock) -> u64 {
    u64::try_from(clock.now().timestamp()).unwrap_or(0)
}
