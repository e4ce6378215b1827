//! Gateway Integration Tests
//!
//! Drive a real `GatewayClient` against the in-process mock gateway and
//! mock REST server.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use chatlink_core::{EventTags, EventType, Intents, Snowflake};
use chatlink_gateway::dispatch::{content_starts_with, from_user, id_at, predicate};
use chatlink_gateway::protocol::CloseCode;
use chatlink_gateway::{
    handler_fn, ConnectionPhase, EventRegistry, GatewayError, GatewayMessage, HandlerError,
    OpCode, Propagation, Registration, WaitError,
};
use integration_tests::{eventually, Harness, QUIET_HEARTBEAT_MS};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn ping_registry() -> EventRegistry {
    let mut registry = EventRegistry::new();
    registry.register(
        Registration::new(
            EventType::MessageCreate,
            handler_fn(|ctx, data| async move {
                let channel_id = id_at(&data, "/channel_id")
                    .ok_or_else(|| HandlerError::bad_request("no channel"))?;
                ctx.http()
                    .create_message(channel_id, json!({"content": "pong"}))
                    .await?;
                Ok(Propagation::Stop)
            }),
        )
        .shared_predicate(content_starts_with("!ping"))
        .label("ping"),
    );
    registry
}

// ============================================================================
// Handshake and Dispatch Tests
// ============================================================================

#[tokio::test]
async fn test_identify_ready_and_dispatch() {
    let mut harness = Harness::start(ping_registry()).await.unwrap();

    let mut conn = harness.gateway.accept().await.unwrap();
    assert_eq!(conn.query(), "v=10&encoding=json&compress=zlib-stream");
    assert_eq!(harness.rest.requests_to("/gateway/bot").len(), 1);

    conn.hello(QUIET_HEARTBEAT_MS).await.unwrap();
    let identify = conn.expect(OpCode::Identify).await.unwrap();
    let d = identify.d.unwrap();
    assert_eq!(d["token"], "test-token");
    assert_eq!(d["shard"], json!([0, 1]));
    assert_eq!(d["large_threshold"], 250);
    let intents = Intents::from_bits_truncate(d["intents"].as_u64().unwrap());
    assert!(intents.contains(Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES));
    assert_eq!(harness.client.phase(), ConnectionPhase::Identifying);

    conn.dispatch("READY", 1, integration_tests::ready_payload("session-1", &harness.gateway.url()))
        .await
        .unwrap();
    let client = Arc::clone(&harness.client);
    eventually("READY", move || client.phase() == ConnectionPhase::Connected)
        .await
        .unwrap();
    assert_eq!(harness.client.state().session_id.as_deref(), Some("session-1"));

    conn.dispatch(
        "MESSAGE_CREATE",
        2,
        json!({"id": "10", "guild_id": "3", "channel_id": "55", "content": "!ping", "author": {"id": "9"}}),
    )
    .await
    .unwrap();

    let rest = &harness.rest;
    eventually("the pong reply", || !rest.requests_to("/channels/55/messages").is_empty())
        .await
        .unwrap();
    let replies = rest.requests_to("/channels/55/messages");
    let reply = &replies[0];
    assert_eq!(reply.body["content"], "pong");
    assert_eq!(reply.authorization.as_deref(), Some("Bot test-token"));
    assert_eq!(harness.client.state().last_sequence, Some(2));

    harness.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_split_and_text_frames_decode() {
    let mut harness = Harness::start(EventRegistry::new()).await.unwrap();
    let mut conn = harness.connect_ready("session-1").await.unwrap();

    conn.send_split(&GatewayMessage::dispatch("TYPING_START", 2, json!({"channel_id": "1"})))
        .await
        .unwrap();
    conn.send_text(&GatewayMessage::dispatch("TYPING_START", 3, json!({"channel_id": "1"})))
        .await
        .unwrap();

    let client = Arc::clone(&harness.client);
    eventually("both frames", move || client.state().last_sequence == Some(3))
        .await
        .unwrap();

    harness.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_heartbeat_request_and_ack() {
    let mut harness = Harness::start(EventRegistry::new()).await.unwrap();
    let mut conn = harness.connect_ready("session-1").await.unwrap();

    conn.send(&GatewayMessage {
        op: OpCode::Heartbeat,
        d: None,
        s: None,
        t: None,
    })
    .await
    .unwrap();

    let beat = conn.recv_raw().await.unwrap().unwrap();
    assert_eq!(beat.op, OpCode::Heartbeat);
    assert_eq!(beat.d, Some(json!(1)));

    conn.send(&GatewayMessage::heartbeat_ack()).await.unwrap();
    let client = Arc::clone(&harness.client);
    eventually("latency", move || client.state().latency.is_some())
        .await
        .unwrap();

    harness.stop().await.unwrap().unwrap();
}

// ============================================================================
// Session Invalidation Tests
// ============================================================================

#[tokio::test]
async fn test_resumable_invalid_session_sends_resume() {
    let mut harness = Harness::start(EventRegistry::new()).await.unwrap();
    let mut conn = harness.connect_ready("session-1").await.unwrap();

    conn.send(&GatewayMessage::invalid_session(true)).await.unwrap();
    let resume = conn.expect(OpCode::Resume).await.unwrap();
    let d = resume.d.unwrap();
    assert_eq!(d["session_id"], "session-1");
    assert_eq!(d["seq"], 1);
    assert_eq!(d["token"], "test-token");

    harness.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_invalid_session_reidentifies() {
    let mut harness = Harness::start(EventRegistry::new()).await.unwrap();
    let mut conn = harness.connect_ready("session-1").await.unwrap();

    conn.send(&GatewayMessage::invalid_session(false)).await.unwrap();
    conn.expect(OpCode::Identify).await.unwrap();

    let state = harness.client.state();
    assert_eq!(state.session_id, None);
    assert_eq!(state.last_sequence, None);
    assert_eq!(state.phase, ConnectionPhase::Identifying);

    harness.stop().await.unwrap().unwrap();
}

// ============================================================================
// Reconnect Tests
// ============================================================================

#[tokio::test]
async fn test_reconnect_request_resumes_on_new_socket() {
    let mut harness = Harness::start(EventRegistry::new()).await.unwrap();
    let mut conn = harness.connect_ready("session-1").await.unwrap();
    conn.dispatch("GUILD_CREATE", 2, json!({"id": "3"})).await.unwrap();
    let client = Arc::clone(&harness.client);
    eventually("sequence 2", move || client.state().last_sequence == Some(2))
        .await
        .unwrap();

    conn.send(&GatewayMessage::reconnect()).await.unwrap();
    assert_eq!(conn.recv_close().await.unwrap(), Some(4000));

    let mut conn = harness.gateway.accept().await.unwrap();
    conn.hello(QUIET_HEARTBEAT_MS).await.unwrap();
    let resume = conn.expect(OpCode::Resume).await.unwrap().d.unwrap();
    assert_eq!(resume["session_id"], "session-1");
    assert_eq!(resume["seq"], 2);

    conn.dispatch("RESUMED", 3, json!({})).await.unwrap();
    let client = Arc::clone(&harness.client);
    eventually("RESUMED", move || client.phase() == ConnectionPhase::Connected)
        .await
        .unwrap();
    // Resume URL came from READY, so REST was only asked once
    assert_eq!(harness.rest.requests_to("/gateway/bot").len(), 1);

    harness.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_dropped_socket_resumes() {
    let mut harness = Harness::start(EventRegistry::new()).await.unwrap();
    let conn = harness.connect_ready("session-1").await.unwrap();
    conn.close(4000).await.unwrap();

    let mut conn = harness.gateway.accept().await.unwrap();
    conn.hello(QUIET_HEARTBEAT_MS).await.unwrap();
    conn.expect(OpCode::Resume).await.unwrap();

    harness.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_session_timeout_close_reidentifies() {
    let mut harness = Harness::start(EventRegistry::new()).await.unwrap();
    let conn = harness.connect_ready("session-1").await.unwrap();
    conn.close(4009).await.unwrap();

    let mut conn = harness.gateway.accept().await.unwrap();
    conn.hello(QUIET_HEARTBEAT_MS).await.unwrap();
    conn.expect(OpCode::Identify).await.unwrap();
    // Without a resume URL the client went back to REST for the gateway
    assert_eq!(harness.rest.requests_to("/gateway/bot").len(), 2);

    harness.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unacknowledged_heartbeat_reconnects() {
    let mut harness = Harness::start(EventRegistry::new()).await.unwrap();
    let mut conn = harness.connect_ready("session-1").await.unwrap();

    // Short interval and no acks: the second due beat finds the first unanswered
    conn.hello(100).await.unwrap();
    assert_eq!(conn.recv_close().await.unwrap(), Some(4000));

    let mut conn = harness.gateway.accept().await.unwrap();
    conn.hello(QUIET_HEARTBEAT_MS).await.unwrap();
    let resume = conn.expect(OpCode::Resume).await.unwrap().d.unwrap();
    assert_eq!(resume["session_id"], "session-1");

    harness.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_fatal_close_ends_run() {
    let mut harness = Harness::start(EventRegistry::new()).await.unwrap();
    let mut conn = harness.gateway.accept().await.unwrap();
    conn.hello(QUIET_HEARTBEAT_MS).await.unwrap();
    conn.expect(OpCode::Identify).await.unwrap();
    conn.close(4004).await.unwrap();

    let client = Arc::clone(&harness.client);
    let result = harness.finished().await.unwrap();
    assert!(matches!(
        result,
        Err(GatewayError::FatalClose(CloseCode::AuthenticationFailed))
    ));
    assert_eq!(client.phase(), ConnectionPhase::Disconnected);
}

// ============================================================================
// Waiter and Shutdown Tests
// ============================================================================

#[tokio::test]
async fn test_wait_for_direct_message() {
    let mut harness = Harness::start(EventRegistry::new()).await.unwrap();
    let mut conn = harness.connect_ready("session-1").await.unwrap();

    let waiting = {
        let client = Arc::clone(&harness.client);
        tokio::spawn(async move {
            client
                .wait_for(
                    EventTags::DIRECT.apply("MESSAGE_CREATE"),
                    from_user(Snowflake::new(42)),
                    Duration::from_secs(5),
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Guild message from the right user: not direct, so no match
    conn.dispatch(
        "MESSAGE_CREATE",
        2,
        json!({"guild_id": "1", "channel_id": "5", "content": "guild", "author": {"id": "42"}}),
    )
    .await
    .unwrap();
    conn.dispatch(
        "MESSAGE_CREATE",
        3,
        json!({"channel_id": "6", "content": "direct", "author": {"id": "42"}}),
    )
    .await
    .unwrap();

    let data = waiting.await.unwrap().unwrap();
    assert_eq!(data["content"], "direct");

    let timed_out = harness
        .client
        .wait_for("GUILD_DELETE", predicate(|_| true), Duration::from_millis(50))
        .await;
    assert_eq!(timed_out, Err(WaitError::Timeout(Duration::from_millis(50))));

    harness.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_cleanly() {
    let mut harness = Harness::start(EventRegistry::new()).await.unwrap();
    let mut conn = harness.connect_ready("session-1").await.unwrap();

    let pending = {
        let client = Arc::clone(&harness.client);
        tokio::spawn(async move {
            client
                .wait_for("MESSAGE_CREATE", predicate(|_| true), Duration::from_secs(30))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = Arc::clone(&harness.client);
    client.shutdown_handle().shutdown();
    assert_eq!(conn.recv_close().await.unwrap(), Some(1000));

    harness.finished().await.unwrap().unwrap();
    assert_eq!(client.phase(), ConnectionPhase::Disconnected);
    assert!(client.http().is_closed());
    assert!(!client.sender().is_connected());
    assert_eq!(pending.await.unwrap(), Err(WaitError::Cancelled));
}
