//! Gateway session tests against an in-process websocket server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    futures::{SinkExt, StreamExt},
    secrecy::Secret,
    tokio::net::{TcpListener, TcpStream},
    tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message},
};

use {
    recap_buffer::{BufferHandle, RetentionBuffer},
    recap_discord::{
        GatewayConfig, GatewaySession, ReconnectPolicy,
        wire::{GatewayFrame, opcode},
    },
};

type Ws = WebSocketStream<TcpStream>;

const HOUR_MS: u64 = 60 * 60 * 1000;

/// Bind a local gateway server; each accepted connection runs `handler`.
/// Returns the ws:// url and a counter of accepted connections.
async fn ws_server<F, Fut>(handler: F) -> (String, Arc<AtomicUsize>)
where
    F: Fn(Ws, usize) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let handler = handler.clone();
            tokio::spawn(async move {
                if let Ok(ws) = accept_async(stream).await {
                    handler(ws, n).await;
                }
            });
        }
    });

    (format!("ws://{addr}"), connections)
}

fn frame_msg(frame: &GatewayFrame) -> Message {
    Message::Text(serde_json::to_string(frame).unwrap().into())
}

fn hello_msg(interval_ms: u64) -> Message {
    frame_msg(&GatewayFrame {
        op: opcode::HELLO,
        d: serde_json::json!({ "heartbeat_interval": interval_ms }),
        s: None,
        t: None,
    })
}

fn ack_msg() -> Message {
    frame_msg(&GatewayFrame {
        op: opcode::HEARTBEAT_ACK,
        d: serde_json::Value::Null,
        s: None,
        t: None,
    })
}

fn dispatch_msg(event: &str, d: serde_json::Value, s: u64) -> Message {
    frame_msg(&GatewayFrame {
        op: opcode::DISPATCH,
        d,
        s: Some(s),
        t: Some(event.to_string()),
    })
}

async fn next_frame(ws: &mut Ws) -> Option<GatewayFrame> {
    while let Some(Ok(msg)) = ws.next().await {
        if let Message::Text(text) = msg
            && let Ok(frame) = serde_json::from_str(&text)
        {
            return Some(frame);
        }
    }
    None
}

fn config(url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::new(Secret::new("test-token".into()));
    config.gateway_url = url.into();
    config.backoff_base_ms = 200;
    config.backoff_max_ms = 800;
    config
}

fn buffer() -> BufferHandle {
    BufferHandle::new(RetentionBuffer::new("chan-1", 24 * HOUR_MS))
}

#[tokio::test]
async fn identify_sent_only_after_hello_then_heartbeats_on_interval() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let (url, _connections) = ws_server(move |mut ws, _n| {
        let tx = tx.clone();
        async move {
            ws.send(hello_msg(50)).await.unwrap();
            while let Some(frame) = next_frame(&mut ws).await {
                if frame.op == opcode::HEARTBEAT {
                    let _ = ws.send(ack_msg()).await;
                }
                let _ = tx.send(frame);
            }
        }
    })
    .await;

    let session = GatewaySession::new(config(&url), buffer());
    session.start().await.unwrap();

    // First frame on the wire is identify, sent after hello was consumed.
    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.op, opcode::IDENTIFY);
    assert_eq!(first.d["token"], "test-token");
    assert_eq!(first.d["intents"], 513);

    // Then heartbeats on the hello-supplied interval.
    for _ in 0..2 {
        let beat = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(beat.op, opcode::HEARTBEAT);
    }

    session.stop().await;
}

#[tokio::test]
async fn ready_and_message_dispatches_flow_into_buffer() {
    let (url, _connections) = ws_server(|mut ws, _n| async move {
        ws.send(hello_msg(60_000)).await.unwrap();
        let identify = next_frame(&mut ws).await.unwrap();
        assert_eq!(identify.op, opcode::IDENTIFY);

        ws.send(dispatch_msg(
            "READY",
            serde_json::json!({ "session_id": "sess-1" }),
            1,
        ))
        .await
        .unwrap();

        let author = serde_json::json!({
            "id": "u1", "username": "maia_b", "global_name": "Maia", "bot": false
        });
        let bot_author = serde_json::json!({
            "id": "u2", "username": "helper", "bot": true
        });
        ws.send(dispatch_msg(
            "MESSAGE_CREATE",
            serde_json::json!({
                "id": "m1", "channel_id": "chan-1", "content": "hello", "author": author
            }),
            2,
        ))
        .await
        .unwrap();
        ws.send(dispatch_msg(
            "MESSAGE_CREATE",
            serde_json::json!({
                "id": "m2", "channel_id": "chan-1", "content": "beep", "author": bot_author
            }),
            3,
        ))
        .await
        .unwrap();
        ws.send(dispatch_msg(
            "MESSAGE_CREATE",
            serde_json::json!({
                "id": "m3", "channel_id": "elsewhere", "content": "offtopic",
                "author": {"id": "u3", "username": "nomad", "bot": false}
            }),
            4,
        ))
        .await
        .unwrap();

        // Hold the connection open.
        while ws.next().await.is_some() {}
    })
    .await;

    let events = buffer();
    let session = GatewaySession::new(config(&url), events.clone());
    session.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(session.is_connected());
    let status = session.status();
    assert_eq!(status.session_id.as_deref(), Some("sess-1"));
    assert_eq!(status.reconnect_attempts, 0);

    // Only the non-bot, source-channel message was retained.
    assert_eq!(events.len().await, 1);

    session.stop().await;
}

#[tokio::test]
async fn remote_heartbeat_request_gets_immediate_echo_of_last_sequence() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let (url, _connections) = ws_server(move |mut ws, _n| {
        let tx = tx.clone();
        async move {
            ws.send(hello_msg(60_000)).await.unwrap();
            let _identify = next_frame(&mut ws).await.unwrap();

            // Unknown opcode and unknown dispatch type are both tolerated.
            ws.send(frame_msg(&GatewayFrame {
                op: 42,
                d: serde_json::Value::Null,
                s: None,
                t: None,
            }))
            .await
            .unwrap();
            ws.send(dispatch_msg("TYPING_START", serde_json::json!({}), 7))
                .await
                .unwrap();

            // Ask for an out-of-band heartbeat.
            ws.send(frame_msg(&GatewayFrame {
                op: opcode::HEARTBEAT,
                d: serde_json::Value::Null,
                s: None,
                t: None,
            }))
            .await
            .unwrap();

            while let Some(frame) = next_frame(&mut ws).await {
                let _ = tx.send(frame);
            }
        }
    })
    .await;

    let session = GatewaySession::new(config(&url), buffer());
    session.start().await.unwrap();

    // The heartbeat arrives well before the 60s timer and echoes the remote
    // sequence, not a client-local counter.
    let beat = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no immediate heartbeat within a second")
        .unwrap();
    assert_eq!(beat.op, opcode::HEARTBEAT);
    assert_eq!(beat.d, serde_json::json!(7));

    session.stop().await;
}

#[tokio::test]
async fn reconnects_with_backoff_after_transport_drop() {
    let (url, connections) = ws_server(|mut ws, _n| async move {
        ws.send(hello_msg(60_000)).await.unwrap();
        let _ = ws.close(None).await;
    })
    .await;

    let session = GatewaySession::new(config(&url), buffer());
    session.start().await.unwrap();

    // First connection drops almost immediately; backoff is 200ms, so no
    // second attempt lands this early.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connections.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(
        connections.load(Ordering::SeqCst) >= 2,
        "expected a backoff reconnect attempt"
    );
    assert!(session.status().reconnect_attempts >= 1);

    session.stop().await;
}

#[tokio::test]
async fn stop_mid_backoff_cancels_pending_reconnect() {
    let (url, connections) = ws_server(|mut ws, _n| async move {
        ws.send(hello_msg(60_000)).await.unwrap();
        let _ = ws.close(None).await;
    })
    .await;

    let session = GatewaySession::new(config(&url), buffer());
    session.start().await.unwrap();

    // Let the first connection drop, then stop while the 200ms backoff
    // timer is pending.
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.stop().await;

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(
        connections.load(Ordering::SeqCst),
        1,
        "stop must prevent the pending reconnect from firing"
    );
}

#[tokio::test]
async fn deferred_policy_waits_for_keep_alive_tick() {
    let (url, connections) = ws_server(|mut ws, _n| async move {
        ws.send(hello_msg(60_000)).await.unwrap();
        let _ = ws.close(None).await;
    })
    .await;

    let mut cfg = config(&url);
    cfg.reconnect = ReconnectPolicy::Deferred;
    let session = GatewaySession::new(cfg, buffer());
    session.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        connections.load(Ordering::SeqCst),
        1,
        "deferred policy must not reconnect on its own"
    );

    session.ensure_connected();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(connections.load(Ordering::SeqCst), 2);

    session.stop().await;
}

#[tokio::test]
async fn missed_heartbeat_ack_forces_reconnect() {
    let (url, connections) = ws_server(|mut ws, _n| async move {
        ws.send(hello_msg(80)).await.unwrap();
        // Read but never acknowledge heartbeats.
        while ws.next().await.is_some() {}
    })
    .await;

    let session = GatewaySession::new(config(&url), buffer());
    session.start().await.unwrap();

    // Two unacked intervals force-close the connection; backoff then brings
    // up a fresh one.
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert!(
        connections.load(Ordering::SeqCst) >= 2,
        "unacknowledged heartbeats should force a reconnect"
    );

    session.stop().await;
}

#[tokio::test]
async fn start_is_a_no_op_while_running() {
    let (url, connections) = ws_server(|mut ws, _n| async move {
        ws.send(hello_msg(60_000)).await.unwrap();
        while ws.next().await.is_some() {}
    })
    .await;

    let session = GatewaySession::new(config(&url), buffer());
    session.start().await.unwrap();
    session.start().await.unwrap();
    session.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        connections.load(Ordering::SeqCst),
        1,
        "a running session must never open a second transport"
    );

    session.stop().await;
}

#[tokio::test]
async fn start_fails_fast_without_token() {
    let mut cfg = config("ws://127.0.0.1:9");
    cfg.token = Secret::new(String::new());
    let session = GatewaySession::new(cfg, buffer());
    assert!(session.start().await.is_err());
}
