//! Terminal configuration.

use std::time::Duration;

use paysim_protocol::Capabilities;
use paysim_session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Behavior knobs for the emulated terminal.
///
/// Fixed for the lifetime of a [`CommandProcessor`](crate::CommandProcessor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Idle time after which a session expires. Default: 30 minutes.
    pub session_timeout: Duration,

    /// When `true`, the terminal only acknowledges: no Result is ever
    /// sent. Default: `false`.
    pub ack_only: bool,

    /// Pause between the ACK and the Result. Never delays the ACK.
    /// Default: 500 ms.
    pub response_delay: Duration,

    /// Advertised on Login.
    pub capabilities: Capabilities,
}

impl TerminalConfig {
    /// The session store settings derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            idle_timeout: self.session_timeout,
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(30 * 60),
            ack_only: false,
            response_delay: Duration::from_millis(500),
            capabilities: Capabilities::default(),
        }
    }
}
