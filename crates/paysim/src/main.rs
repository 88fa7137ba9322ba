//! `paysim` binary: reads settings from flags and environment, then runs
//! the emulator until Ctrl-C.

use std::time::Duration;

use clap::Parser;
use paysim::{PaysimError, PaysimServer, ServerConfig};
use paysim_terminal::TerminalConfig;
use tracing_subscriber::EnvFilter;

/// Payment terminal emulator.
#[derive(Debug, Parser)]
#[command(name = "paysim", version, about)]
struct Cli {
    /// Address for the HTTP API.
    #[arg(long, default_value = "0.0.0.0:8000")]
    http_bind: String,

    /// Address for the WebSocket channel.
    #[arg(long, default_value = "0.0.0.0:8001")]
    ws_bind: String,

    /// Minutes a session may sit idle before it expires.
    #[arg(long, env = "SESSION_TIMEOUT_MINUTES", default_value_t = 30)]
    session_timeout_minutes: u64,

    /// Only acknowledge commands; never send Results.
    #[arg(long, env = "ACK_ONLY")]
    ack_only: bool,

    /// Delay between a WebSocket ACK and its Result, in milliseconds.
    #[arg(long, env = "RESPONSE_DELAY_MS", default_value_t = 500)]
    response_delay_ms: u64,

    /// Seconds between sweeps of dead sessions (0 disables sweeping).
    #[arg(long, default_value_t = 60)]
    sweep_interval_secs: u64,

    /// Seconds a WebSocket client gets to finish its upgrade.
    #[arg(long, default_value_t = 10)]
    handshake_timeout_secs: u64,

    /// Log filter (trace, debug, info, warn, error, or a full directive).
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            http_bind: self.http_bind.clone(),
            ws_bind: self.ws_bind.clone(),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            terminal: TerminalConfig {
                session_timeout: Duration::from_secs(
                    self.session_timeout_minutes.saturating_mul(60),
                ),
                ack_only: self.ack_only,
                response_delay: Duration::from_millis(self.response_delay_ms),
                ..TerminalConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), PaysimError> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let server = PaysimServer::builder()
        .config(cli.server_config())
        .build()
        .await?;
    server.run().await
}
