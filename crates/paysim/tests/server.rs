//! Integration tests for the Paysim server over the WebSocket channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use paysim::prelude::*;
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// How long to wait for a message that must NOT arrive.
const QUIET: Duration = Duration::from_millis(300);

struct Running {
    ws_addr: String,
    processor: Arc<CommandProcessor>,
}

/// Starts a server on random ports and returns its WebSocket address.
async fn start_server(builder: PaysimServerBuilder) -> Running {
    let server = builder
        .http_bind("127.0.0.1:0")
        .ws_bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let ws_addr = server.ws_addr().expect("should have ws addr").to_string();
    let processor = server.processor();

    tokio::spawn(async move {
        let _ = server.run_until(std::future::pending()).await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    Running { ws_addr, processor }
}

fn fast() -> PaysimServerBuilder {
    PaysimServer::builder().response_delay(Duration::ZERO)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

async fn recv_json(ws: &mut ClientWs) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("message should arrive in time")
        .expect("stream should be open")
        .expect("message should be valid");
    assert!(msg.is_text(), "replies are text frames");
    serde_json::from_slice(&msg.into_data()).expect("reply should be JSON")
}

async fn assert_quiet(ws: &mut ClientWs) {
    let next = tokio::time::timeout(QUIET, ws.next()).await;
    assert!(next.is_err(), "expected no further message, got {next:?}");
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_login_then_sale_over_websocket() {
    let server = start_server(fast()).await;
    let mut ws = connect(&server.ws_addr).await;

    send_json(&mut ws, json!({"cmd": "Login", "req_id": "r1", "args": {"user": "alice"}})).await;
    let ack = recv_json(&mut ws).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["req_id"], "r1");
    assert_eq!(ack["cmd"], "Login");
    assert_eq!(ack["status"], "accepted");

    let login = recv_json(&mut ws).await;
    assert_eq!(login["type"], "result");
    assert_eq!(login["status"], "success");
    assert_eq!(login["user"], "alice");
    let session_id = login["session_id"].as_str().expect("session id").to_string();
    assert!(session_id.starts_with("sess_"));

    send_json(
        &mut ws,
        json!({"cmd": "Sale", "req_id": "r2", "args": {"amount": 12.5, "session_id": session_id}}),
    )
    .await;
    let ack = recv_json(&mut ws).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["req_id"], "r2");

    let sale = recv_json(&mut ws).await;
    assert_eq!(sale["type"], "result");
    assert_eq!(sale["cmd"], "Sale");
    assert_eq!(sale["amount"], 12.5);
    assert!(sale["txn_id"].as_str().unwrap().starts_with('T'));
    assert_eq!(sale["auth_code"].as_str().unwrap().len(), 6);

    let session = server.processor.sessions().get(&session_id).expect("live session");
    assert_eq!(session.transactions.len(), 1);
}

#[tokio::test]
async fn test_unknown_command_gets_rejected_ack_only() {
    let server = start_server(fast()).await;
    let mut ws = connect(&server.ws_addr).await;

    send_json(&mut ws, json!({"cmd": "Frobnicate", "req_id": "r9"})).await;
    let ack = recv_json(&mut ws).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["status"], "rejected");
    assert_eq!(ack["cmd"], "Frobnicate");
    assert_quiet(&mut ws).await;
}

#[tokio::test]
async fn test_advice_gets_accepted_ack_only() {
    let server = start_server(fast()).await;
    let mut ws = connect(&server.ws_addr).await;

    send_json(&mut ws, json!({"cmd": "PaymentResponse", "req_id": "r1"})).await;
    let ack = recv_json(&mut ws).await;
    assert_eq!(ack["status"], "accepted");
    assert_quiet(&mut ws).await;
}

#[tokio::test]
async fn test_invalid_json_gets_error_and_connection_stays_open() {
    let server = start_server(fast()).await;
    let mut ws = connect(&server.ws_addr).await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    let error = recv_json(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["reason"], "invalid_json");
    assert!(error["detail"].is_string());

    send_json(&mut ws, json!({"cmd": "Logout", "req_id": "r2"})).await;
    let ack = recv_json(&mut ws).await;
    assert_eq!(ack["type"], "ack");
    let result = recv_json(&mut ws).await;
    assert_eq!(result["status"], "success");
}

#[tokio::test]
async fn test_invalid_args_get_fail_result() {
    let server = start_server(fast()).await;
    let mut ws = connect(&server.ws_addr).await;

    send_json(&mut ws, json!({"cmd": "Sale", "req_id": "r1", "args": {"amount": "ten"}})).await;
    let ack = recv_json(&mut ws).await;
    assert_eq!(ack["status"], "accepted");
    let result = recv_json(&mut ws).await;
    assert_eq!(result["type"], "result");
    assert_eq!(result["status"], "fail");
    assert_eq!(result["reason"], "invalid_args");
}

#[tokio::test]
async fn test_ack_only_mode_never_sends_results() {
    let server = start_server(fast().ack_only(true)).await;
    let mut ws = connect(&server.ws_addr).await;

    // Replies on one connection are ordered, so a Result would show up
    // between two ACKs.
    for (i, kind) in CommandKind::ALL.into_iter().enumerate() {
        let req_id = format!("r{i}");
        let args = json!({"user": "alice", "amount": 5, "session_id": "sess_1", "txn_id": "T1"});
        send_json(&mut ws, json!({"cmd": kind.as_str(), "req_id": &req_id, "args": args})).await;
        let ack = recv_json(&mut ws).await;
        assert_eq!(ack["type"], "ack", "{kind} should get an ACK first");
        assert_eq!(ack["req_id"], req_id);
        assert_eq!(ack["cmd"], kind.as_str());
        assert_eq!(ack["status"], "accepted");
    }

    send_json(&mut ws, json!({"cmd": "Sale", "req_id": "bad", "args": {"amount": "ten"}})).await;
    let ack = recv_json(&mut ws).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["req_id"], "bad");
    assert_eq!(ack["status"], "accepted");

    assert_quiet(&mut ws).await;
    assert!(server.processor.sessions().is_empty());
}

#[tokio::test]
async fn test_response_delay_separates_ack_and_result() {
    let delay = Duration::from_millis(200);
    let server = start_server(PaysimServer::builder().response_delay(delay)).await;
    let mut ws = connect(&server.ws_addr).await;

    send_json(&mut ws, json!({"cmd": "Completion", "req_id": "r1", "args": {"txn_id": "T1"}})).await;
    let ack = recv_json(&mut ws).await;
    let acked_at = Instant::now();
    assert_eq!(ack["type"], "ack");

    let result = recv_json(&mut ws).await;
    assert_eq!(result["type"], "result");
    assert_eq!(result["txn_id"], "T1");
    assert!(acked_at.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_binary_frames_are_accepted() {
    let server = start_server(fast()).await;
    let mut ws = connect(&server.ws_addr).await;

    let body = json!({"cmd": "Loyalty", "req_id": "r1"}).to_string();
    ws.send(Message::Binary(body.into_bytes().into())).await.unwrap();

    assert_eq!(recv_json(&mut ws).await["type"], "ack");
    let result = recv_json(&mut ws).await;
    assert_eq!(result["points"], 1000);
}

#[tokio::test]
async fn test_replies_keep_request_order() {
    let server = start_server(fast()).await;
    let mut ws = connect(&server.ws_addr).await;

    for i in 0..3 {
        send_json(&mut ws, json!({"cmd": "Reversal", "req_id": format!("r{i}")})).await;
    }
    for i in 0..3 {
        let ack = recv_json(&mut ws).await;
        assert_eq!(ack["type"], "ack");
        assert_eq!(ack["req_id"], format!("r{i}"));
        let result = recv_json(&mut ws).await;
        assert_eq!(result["type"], "result");
        assert_eq!(result["req_id"], format!("r{i}"));
    }
}

#[tokio::test]
async fn test_connections_are_independent() {
    let server = start_server(fast()).await;
    let mut first = connect(&server.ws_addr).await;
    let mut second = connect(&server.ws_addr).await;

    first.send(Message::Text("garbage".into())).await.unwrap();
    assert_eq!(recv_json(&mut first).await["type"], "error");
    drop(first);

    send_json(&mut second, json!({"cmd": "Refund", "req_id": "r1", "args": {"amount": 2}})).await;
    assert_eq!(recv_json(&mut second).await["type"], "ack");
    let refund = recv_json(&mut second).await;
    assert!(refund["txn_id"].as_str().unwrap().starts_with('R'));
}

#[tokio::test]
async fn test_run_until_stops_on_shutdown_signal() {
    let server = fast()
        .http_bind("127.0.0.1:0")
        .ws_bind("127.0.0.1:0")
        .build()
        .await
        .unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(server.run_until(async move {
        let _ = rx.await;
    }));
    tx.send(()).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("server should stop promptly")
        .expect("task should not panic");
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn test_sweeper_removes_expired_sessions() {
    let clock = Arc::new(ManualClock::default());
    let server = start_server(
        fast()
            .clock(clock.clone())
            .session_timeout(Duration::from_secs(60))
            .sweep_interval(Duration::from_millis(20)),
    )
    .await;
    let mut ws = connect(&server.ws_addr).await;

    send_json(&mut ws, json!({"cmd": "Login", "req_id": "r1"})).await;
    recv_json(&mut ws).await;
    recv_json(&mut ws).await;
    assert_eq!(server.processor.sessions().len(), 1);

    clock.advance(Duration::from_secs(61));
    let deadline = Instant::now() + Duration::from_secs(2);
    while !server.processor.sessions().is_empty() {
        assert!(Instant::now() < deadline, "sweeper should remove the session");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_stalled_client_does_not_block_new_connections() {
    let server = start_server(fast()).await;

    // Connects at the TCP level and never sends the upgrade request.
    let _idle = TcpStream::connect(server.ws_addr.as_str())
        .await
        .expect("tcp connect");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut ws = tokio::time::timeout(Duration::from_secs(2), connect(&server.ws_addr))
        .await
        .expect("second client should not wait on the idle one");
    send_json(&mut ws, json!({"cmd": "Logout", "req_id": "r1"})).await;
    assert_eq!(recv_json(&mut ws).await["type"], "ack");
    assert_eq!(recv_json(&mut ws).await["status"], "success");
}

#[tokio::test]
async fn test_silent_client_is_dropped_after_handshake_timeout() {
    let server = start_server(fast().handshake_timeout(Duration::from_millis(100))).await;
    let mut idle = TcpStream::connect(server.ws_addr.as_str())
        .await
        .expect("tcp connect");

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), idle.read(&mut buf))
        .await
        .expect("server should close the silent socket");
    assert!(
        matches!(read, Ok(0) | Err(_)),
        "expected EOF or reset, got {read:?}"
    );
}
