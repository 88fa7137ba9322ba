//! HTTP adapter: one POST route per command, answered in a single
//! response that carries both phases.
//!
//! ```text
//! POST /api/v1/payment/sale   {"cmd":"Sale","req_id":"r1","args":{...}}
//!   → 200 {"ack": {...}, "result": {...} | null}
//! ```
//!
//! The body is the same JSON frame the WebSocket channel carries. Each
//! route only takes the command it is named after. No response delay is
//! applied here, since the ACK and the Result leave together.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use paysim_protocol::{
    Ack, AdviceKind, Codec, CommandKind, ErrorEnvelope, Frame, ProtocolError, ResultEnvelope,
};
use paysim_terminal::Accepted;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;

use crate::server::ServerState;

/// Shown by `GET /health`.
pub const SERVICE_NAME: &str = "Path Payment Terminal API Emulator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Health,
    Command(CommandKind),
    Advice(AdviceKind),
}

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        let route = match path {
            "/health" => Self::Health,
            "/api/v1/login" => Self::Command(CommandKind::Login),
            "/api/v1/logout" => Self::Command(CommandKind::Logout),
            "/api/v1/payment/sale" => Self::Command(CommandKind::Sale),
            "/api/v1/payment/refund" => Self::Command(CommandKind::Refund),
            "/api/v1/payment/response" => Self::Advice(AdviceKind::PaymentResponse),
            "/api/v1/reversal" => Self::Command(CommandKind::Reversal),
            "/api/v1/cancellation" => Self::Command(CommandKind::Cancellation),
            "/api/v1/completion" => Self::Command(CommandKind::Completion),
            "/api/v1/completion/response" => Self::Advice(AdviceKind::CompletionResponse),
            "/api/v1/auto-reversal" => Self::Command(CommandKind::AutoReversal),
            "/api/v1/loyalty" => Self::Command(CommandKind::Loyalty),
            "/api/v1/loyalty/response" => Self::Advice(AdviceKind::LoyaltyResponse),
            _ => return None,
        };
        Some(route)
    }

    fn method(self) -> Method {
        match self {
            Self::Health => Method::GET,
            Self::Command(_) | Self::Advice(_) => Method::POST,
        }
    }

    fn expected_cmd(self) -> Option<&'static str> {
        match self {
            Self::Health => None,
            Self::Command(kind) => Some(kind.as_str()),
            Self::Advice(kind) => Some(kind.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    ack: Ack,
    result: Option<ResultEnvelope>,
}

fn detail(message: impl Into<String>) -> Value {
    json!({ "detail": message.into() })
}

/// Answers one request. Pure apart from the processor's session store,
/// so tests can call it without a socket.
pub(crate) fn dispatch<C: Codec>(
    state: &ServerState<C>,
    method: &Method,
    path: &str,
    body: &[u8],
) -> (StatusCode, Value) {
    let Some(route) = Route::from_path(path) else {
        return (StatusCode::NOT_FOUND, detail("Not Found"));
    };
    if *method != route.method() {
        return (StatusCode::METHOD_NOT_ALLOWED, detail("Method Not Allowed"));
    }
    let Some(expected) = route.expected_cmd() else {
        return (
            StatusCode::OK,
            json!({ "status": "healthy", "service": SERVICE_NAME }),
        );
    };

    let frame: Frame = match state.codec.decode(body) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(path, error = %e, "failed to decode request body");
            let message = match e {
                ProtocolError::Decode(inner) | ProtocolError::Encode(inner) => inner.to_string(),
            };
            return encode_value(StatusCode::BAD_REQUEST, &ErrorEnvelope::invalid_json(message));
        }
    };
    if frame.cmd != expected {
        tracing::warn!(path, cmd = %frame.cmd, "command does not match route");
        return (
            StatusCode::BAD_REQUEST,
            detail(format!("Command must be '{expected}'")),
        );
    }

    let processor = &state.processor;
    let accepted = processor.accept(&frame);
    let ack = accepted.ack().clone();
    let result = match accepted {
        _ if !processor.is_verbose() => None,
        Accepted::Command { command, .. } => Some(processor.process(&frame.req_id, &command)),
        Accepted::Invalid { result, .. } => Some(result),
        Accepted::Rejected(_) | Accepted::Advice(_) => None,
    };

    encode_value(StatusCode::OK, &CommandResponse { ack, result })
}

fn encode_value<T: Serialize>(status: StatusCode, value: &T) -> (StatusCode, Value) {
    match serde_json::to_value(value) {
        Ok(value) => (status, value),
        Err(e) => {
            tracing::warn!(error = %e, "response encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, detail(e.to_string()))
        }
    }
}

/// Serves one HTTP connection until the client closes it.
pub(crate) async fn serve_http<C: Codec>(
    stream: TcpStream,
    state: Arc<ServerState<C>>,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(handle_request(&state, req).await) }
    });
    http1::Builder::new().serve_connection(io, service).await
}

async fn handle_request<C: Codec>(
    state: &ServerState<C>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let (status, value) = match req.into_body().collect().await {
        Ok(collected) => dispatch(state, &method, &path, &collected.to_bytes()),
        Err(e) => (StatusCode::BAD_REQUEST, detail(e.to_string())),
    };
    tracing::debug!(%method, path, status = status.as_u16(), "http request");

    let (status, bytes) = match state.codec.encode(&value) {
        Ok(bytes) => (status, bytes),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string().into_bytes(),
        ),
    };

    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
