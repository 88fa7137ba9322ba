//! `PaysimServer` builder and server loop.
//!
//! This is the entry point for running the emulator. It ties the layers
//! together: transports (WebSocket and HTTP) → protocol → terminal.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use paysim_protocol::{Codec, JsonCodec};
use paysim_session::{Clock, SystemClock};
use paysim_terminal::{CommandProcessor, TerminalConfig};
use paysim_transport::{DEFAULT_HANDSHAKE_TIMEOUT, Handshake, Transport, WebSocketTransport};
use tokio::net::TcpListener;

use crate::PaysimError;
use crate::handler::handle_connection;
use crate::http::serve_http;

/// Pause after a failed `accept` so a persistent fault (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// processor synchronizes its own session store, so no outer lock.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) processor: Arc<CommandProcessor>,
    pub(crate) codec: C,
}

impl ServerState<JsonCodec> {
    pub(crate) fn new(processor: Arc<CommandProcessor>) -> Self {
        Self {
            processor,
            codec: JsonCodec,
        }
    }
}

/// Listener addresses and housekeeping settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Default: `0.0.0.0:8000`.
    pub http_bind: String,
    /// Default: `0.0.0.0:8001`.
    pub ws_bind: String,
    /// How often dead sessions are swept. Zero disables sweeping.
    /// Default: 60 seconds.
    pub sweep_interval: Duration,
    /// How long a WebSocket client gets to finish its upgrade.
    /// Default: 10 seconds.
    pub handshake_timeout: Duration,
    pub terminal: TerminalConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind: "0.0.0.0:8000".to_string(),
            ws_bind: "0.0.0.0:8001".to_string(),
            sweep_interval: Duration::from_secs(60),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            terminal: TerminalConfig::default(),
        }
    }
}

/// Builder for configuring and starting a Paysim server.
///
/// # Example
///
/// ```rust,no_run
/// use paysim::prelude::*;
///
/// # async fn start() -> Result<(), PaysimError> {
/// let server = PaysimServer::builder()
///     .http_bind("127.0.0.1:8000")
///     .ws_bind("127.0.0.1:8001")
///     .ack_only(false)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PaysimServerBuilder {
    config: ServerConfig,
    clock: Arc<dyn Clock>,
}

impl PaysimServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn http_bind(mut self, addr: &str) -> Self {
        self.config.http_bind = addr.to_string();
        self
    }

    pub fn ws_bind(mut self, addr: &str) -> Self {
        self.config.ws_bind = addr.to_string();
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn terminal(mut self, config: TerminalConfig) -> Self {
        self.config.terminal = config;
        self
    }

    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.terminal.session_timeout = timeout;
        self
    }

    pub fn ack_only(mut self, ack_only: bool) -> Self {
        self.config.terminal.ack_only = ack_only;
        self
    }

    pub fn response_delay(mut self, delay: Duration) -> Self {
        self.config.terminal.response_delay = delay;
        self
    }

    /// Time source for sessions, identifiers and Result timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Binds both listeners and builds the shared processor.
    ///
    /// # Errors
    /// Fails if either address cannot be bound.
    pub async fn build(self) -> Result<PaysimServer, PaysimError> {
        let ws = WebSocketTransport::bind(&self.config.ws_bind)
            .await?
            .with_handshake_timeout(self.config.handshake_timeout);
        let http = TcpListener::bind(&self.config.http_bind).await?;
        tracing::info!(addr = %self.config.http_bind, "HTTP listener bound");

        let processor = Arc::new(CommandProcessor::with_clock(
            self.config.terminal,
            self.clock,
        ));

        Ok(PaysimServer {
            ws,
            http,
            state: Arc::new(ServerState::new(processor)),
            sweep_interval: self.config.sweep_interval,
        })
    }
}

impl Default for PaysimServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Paysim server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PaysimServer {
    ws: WebSocketTransport,
    http: TcpListener,
    state: Arc<ServerState<JsonCodec>>,
    sweep_interval: Duration,
}

impl PaysimServer {
    /// Creates a new builder.
    pub fn builder() -> PaysimServerBuilder {
        PaysimServerBuilder::new()
    }

    /// Returns the address the WebSocket listener is bound to.
    pub fn ws_addr(&self) -> std::io::Result<SocketAddr> {
        self.ws.local_addr()
    }

    /// Returns the address the HTTP listener is bound to.
    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http.local_addr()
    }

    /// The processor shared by every connection.
    pub fn processor(&self) -> Arc<CommandProcessor> {
        Arc::clone(&self.state.processor)
    }

    /// Runs until Ctrl-C.
    pub async fn run(self) -> Result<(), PaysimError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs the accept loops and the session sweeper until `shutdown`
    /// completes.
    ///
    /// Connections already being served are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), PaysimError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            ws = ?self.ws.local_addr().ok(),
            http = ?self.http.local_addr().ok(),
            ack_only = !self.state.processor.is_verbose(),
            "Paysim server running"
        );

        let ws_task = tokio::spawn(accept_websocket(self.ws, Arc::clone(&self.state)));
        let http_task = tokio::spawn(accept_http(self.http, Arc::clone(&self.state)));
        let sweep_task = (!self.sweep_interval.is_zero()).then(|| {
            tokio::spawn(sweep_sessions(
                Arc::clone(&self.state.processor),
                self.sweep_interval,
            ))
        });

        shutdown.await;
        tracing::info!("Paysim server shutting down");

        ws_task.abort();
        http_task.abort();
        if let Some(task) = sweep_task {
            task.abort();
        }
        Ok(())
    }
}

/// Accepts WebSocket clients and spawns a task for each that runs the
/// upgrade and then the handler. The loop itself never waits on a client.
async fn accept_websocket(mut transport: WebSocketTransport, state: Arc<ServerState<JsonCodec>>) {
    loop {
        match transport.accept().await {
            Ok(handshake) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let peer = handshake.peer_addr();
                    let conn = match handshake.complete().await {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::debug!(%peer, error = %e, "WebSocket handshake failed");
                            return;
                        }
                    };
                    if let Err(e) = handle_connection(conn, state).await {
                        tracing::debug!(%peer, error = %e, "connection ended with error");
                    }
                });
            }
            Err(e) => accept_failed("WebSocket", &e).await,
        }
    }
}

/// Accepts HTTP clients and lets hyper serve each on its own task.
async fn accept_http(listener: TcpListener, state: Arc<ServerState<JsonCodec>>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = serve_http(stream, state).await {
                        tracing::debug!(%peer, error = %e, "http connection error");
                    }
                });
            }
            Err(e) => accept_failed("HTTP", &e).await,
        }
    }
}

async fn accept_failed(listener: &'static str, error: &(dyn std::error::Error + Send + Sync)) {
    tracing::warn!(listener, %error, "accept failed");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// Periodically drops expired and ended sessions.
async fn sweep_sessions(processor: Arc<CommandProcessor>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        processor.sessions().sweep();
    }
}
