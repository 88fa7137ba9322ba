//! Per-connection WebSocket handler.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! Messages on one connection are handled strictly one after another:
//!   1. Receive a message → decode it as a frame (or answer with an
//!      `invalid_json` error envelope and keep listening)
//!   2. Send the ACK
//!   3. Unless ACK-only, or the command is unknown or an advice:
//!      wait the response delay, process, send the Result

use std::sync::Arc;

use paysim_protocol::{Codec, ErrorEnvelope, Frame, ProtocolError, ResultEnvelope};
use paysim_terminal::Accepted;
use paysim_transport::{Connection, WebSocketConnection};
use serde::Serialize;

use crate::PaysimError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
///
/// Returns an error only for transport faults, which end this
/// connection and nothing else.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), PaysimError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    while let Some(data) = conn.recv().await? {
        handle_message(&conn, &state, &data).await?;
    }

    tracing::debug!(%conn_id, "connection closed cleanly");
    Ok(())
}

/// Runs one request through the ACK and Result phases.
async fn handle_message<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    data: &[u8],
) -> Result<(), PaysimError> {
    let frame: Frame = match state.codec.decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(conn_id = %conn.id(), error = %e, "failed to decode frame");
            let detail = match e {
                ProtocolError::Decode(inner) | ProtocolError::Encode(inner) => inner.to_string(),
            };
            return send(conn, &state.codec, &ErrorEnvelope::invalid_json(detail)).await;
        }
    };

    let processor = &state.processor;
    let accepted = processor.accept(&frame);
    send(conn, &state.codec, accepted.ack()).await?;

    if !processor.is_verbose() {
        return Ok(());
    }

    let result = match accepted {
        Accepted::Rejected(_) | Accepted::Advice(_) => return Ok(()),
        Accepted::Invalid { result, .. } => {
            pause(state).await;
            result
        }
        Accepted::Command { command, .. } => {
            pause(state).await;
            processor.process(&frame.req_id, &command)
        }
    };
    send_result(conn, state, &result).await
}

async fn pause<C: Codec>(state: &ServerState<C>) {
    let delay = state.processor.response_delay();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Sends a Result, replacing it with a failed Result if it cannot be
/// encoded.
async fn send_result<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    result: &ResultEnvelope,
) -> Result<(), PaysimError> {
    let bytes = match state.codec.encode(result) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(req_id = %result.req_id, error = %e, "result encoding failed");
            let fallback =
                state
                    .processor
                    .fail(&result.req_id, result.cmd, "exception", e.to_string());
            state.codec.encode(&fallback)?
        }
    };
    conn.send(&bytes).await?;
    Ok(())
}

async fn send<C: Codec, T: Serialize>(
    conn: &WebSocketConnection,
    codec: &C,
    value: &T,
) -> Result<(), PaysimError> {
    let bytes = codec.encode(value)?;
    conn.send(&bytes).await?;
    Ok(())
}
