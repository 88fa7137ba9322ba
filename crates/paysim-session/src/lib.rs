//! Terminal session tracking for Paysim.
//!
//! This crate owns every session the emulator knows about:
//!
//! 1. **Creation**: a Login creates (or replaces) a session by id
//! 2. **Lookup**: commands that reference a session refresh its activity
//!    timestamp, and sessions idle past the timeout stop resolving
//! 3. **History**: Sale and Refund append transaction records
//! 4. **Reclamation**: [`SessionStore::sweep`] drops dead sessions
//!
//! # How it fits in the stack
//!
//! ```text
//! Terminal (above)  ← the command processor owns one SessionStore
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← provides CommandKind for transaction records
//! ```

mod clock;
mod session;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use session::{Session, SessionConfig, TransactionRecord};
pub use store::SessionStore;
