//! Gateway Integration Tests
//!
//! Runs the bot against the in-process mock gateway. No external services
//! are needed.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use beacon_gateway::{Bot, CommandContext, GatewayError, HandlerResult, RestError};
use integration_tests::fixtures::*;
use integration_tests::{MockGateway, RunningBot};
use serde_json::json;

async fn ping(ctx: CommandContext) -> HandlerResult<()> {
    ctx.send_content("PONG").await
}

fn ping_bot(gateway: &MockGateway) -> Bot {
    let mut bot = Bot::new(gateway.config());
    bot.command("ping", ping);
    bot
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_identify_after_first_hello() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));

    let mut conn = gateway.accept().await.unwrap();
    assert_eq!(conn.path, "/gateway");
    assert_eq!(conn.query.get("v").map(String::as_str), Some("10"));
    assert_eq!(conn.query.get("encoding").map(String::as_str), Some("json"));

    let identify = conn.handshake(45_000).await.unwrap();
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], TEST_TOKEN);
    assert_eq!(identify["d"]["intents"], 513);
    assert_eq!(identify["d"]["properties"]["os"], std::env::consts::OS);
    assert_eq!(identify["d"]["presence"]["status"], "online");

    bot.stop().await.unwrap().unwrap();
    assert_eq!(conn.recv_close().await.unwrap(), Some(1000));
}

#[tokio::test]
async fn test_heartbeat_cadence() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.send_json(hello(300)).await.unwrap();
    let hello_sent = Instant::now();
    assert_eq!(conn.recv_json().await.unwrap()["op"], 2);

    let first = conn.recv_json().await.unwrap();
    let first_at = Instant::now();
    assert_eq!(first, json!({"op": 1, "d": null}));
    assert!(first_at - hello_sent <= Duration::from_millis(600));

    conn.send_json(dispatch(7, "GUILD_CREATE", json!({"id": "1"})))
        .await
        .unwrap();
    conn.send_json(heartbeat_ack()).await.unwrap();

    let second = conn.recv_json().await.unwrap();
    let gap = first_at.elapsed();
    assert_eq!(second, json!({"op": 1, "d": 7}));
    assert!(gap >= Duration::from_millis(250), "beats {gap:?} apart");
    assert!(gap <= Duration::from_millis(1000), "beats {gap:?} apart");

    bot.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_heartbeat_request_answered() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_json(ready(4, "abc", &gateway.resume_url()))
        .await
        .unwrap();
    conn.send_json(heartbeat_request()).await.unwrap();

    let beat = conn.recv_json().await.unwrap();
    assert_eq!(beat, json!({"op": 1, "d": 4}));

    bot.stop().await.unwrap().unwrap();
}

// ============================================================================
// Resume Tests
// ============================================================================

#[tokio::test]
async fn test_reconnect_resumes_on_resume_url() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_json(ready(3, "abc", &gateway.resume_url()))
        .await
        .unwrap();
    conn.send_json(reconnect()).await.unwrap();

    // Not 1000/1001, so the server keeps the session
    assert_eq!(conn.recv_close().await.unwrap(), Some(4900));

    let mut resumed_conn = gateway.accept().await.unwrap();
    assert_eq!(resumed_conn.path, "/resume");
    assert_eq!(resumed_conn.query.get("v").map(String::as_str), Some("10"));
    assert_eq!(
        resumed_conn.query.get("encoding").map(String::as_str),
        Some("json")
    );

    let resume = resumed_conn.handshake(45_000).await.unwrap();
    assert_eq!(
        resume,
        json!({"op": 6, "d": {"token": TEST_TOKEN, "session_id": "abc", "seq": 3}})
    );

    resumed_conn.send_json(resumed(4)).await.unwrap();
    bot.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_resumable_invalid_session() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_json(ready(1, "abc", &gateway.resume_url()))
        .await
        .unwrap();
    conn.send_json(invalid_session(true)).await.unwrap();

    let mut next = gateway.accept().await.unwrap();
    assert_eq!(next.path, "/resume");
    assert_eq!(next.handshake(45_000).await.unwrap()["op"], 6);

    bot.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_invalid_session_reidentifies() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_json(ready(1, "abc", &gateway.resume_url()))
        .await
        .unwrap();
    conn.send_json(invalid_session(false)).await.unwrap();

    let mut next = gateway.accept().await.unwrap();
    assert_eq!(next.path, "/gateway");
    let identify = next.handshake(45_000).await.unwrap();
    assert_eq!(identify["op"], 2);

    bot.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_zombie_connection_resumes() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(100).await.unwrap();
    conn.send_json(ready(2, "abc", &gateway.resume_url()))
        .await
        .unwrap();

    // Heartbeats are never acknowledged
    assert_eq!(conn.recv_close().await.unwrap(), Some(4900));

    let mut next = gateway.accept().await.unwrap();
    assert_eq!(next.path, "/resume");
    let resume = next.handshake(45_000).await.unwrap();
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["seq"], 2);

    bot.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_recoverable_close_code_resumes() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_json(ready(5, "abc", &gateway.resume_url()))
        .await
        .unwrap();
    conn.close(4000, "Unknown error").await.unwrap();

    let mut next = gateway.accept().await.unwrap();
    assert_eq!(next.path, "/resume");
    assert_eq!(next.handshake(45_000).await.unwrap()["d"]["seq"], 5);

    bot.stop().await.unwrap().unwrap();
}

// ============================================================================
// Robustness Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_frames_are_ignored() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_json(json!({"op": 42, "d": {"anything": true}}))
        .await
        .unwrap();
    conn.send_json(dispatch(1, "SOMETHING_NEW", json!({"x": 1})))
        .await
        .unwrap();
    conn.send_json(json!({"op": 10, "d": {"heartbeat_interval": "soon"}}))
        .await
        .unwrap();
    conn.send_json(heartbeat_request()).await.unwrap();

    // Still alive, and the unknown dispatch was tracked
    assert_eq!(conn.recv_op(1).await.unwrap(), json!({"op": 1, "d": 1}));

    bot.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_out_of_range_opcode_is_ignored() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_json(json!({"op": 300, "d": null})).await.unwrap();
    conn.send_json(json!({"op": -1})).await.unwrap();
    conn.send_json(heartbeat_request()).await.unwrap();

    // No READY yet, so a decode failure here would have ended the bot
    assert_eq!(conn.recv_op(1).await.unwrap(), json!({"op": 1, "d": null}));

    bot.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_envelope_without_session_is_fatal() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_text("{not json").await.unwrap();

    match bot.join().await.unwrap() {
        Err(GatewayError::Protocol(_)) => {}
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_envelope_with_session_resumes() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_json(ready(2, "abc", &gateway.resume_url()))
        .await
        .unwrap();
    conn.send_text("{not json").await.unwrap();

    assert_eq!(conn.recv_close().await.unwrap(), Some(4900));

    let mut resumed_conn = gateway.accept().await.unwrap();
    assert_eq!(resumed_conn.path, "/resume");

    let resume = resumed_conn.handshake(45_000).await.unwrap();
    assert_eq!(
        resume,
        json!({"op": 6, "d": {"token": TEST_TOKEN, "session_id": "abc", "seq": 2}})
    );

    bot.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_terminal_close_code_stops_bot() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.close(4004, "Authentication failed").await.unwrap();

    match bot.join().await.unwrap() {
        Err(GatewayError::Closed { code, .. }) => assert_eq!(code, Some(4004)),
        other => panic!("expected terminal close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_token_fails_bootstrap() {
    let gateway = MockGateway::start().await.unwrap();
    let mut config = gateway.config();
    config.discord.token = "wrong-token".to_string();

    let result = Bot::new(config)
        .start(tokio_util::sync::CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(GatewayError::Bootstrap(RestError::Unauthorized(_)))
    ));
}

// ============================================================================
// Command Tests
// ============================================================================

#[tokio::test]
async fn test_command_dispatch_sends_callback() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_json(ready(1, "abc", &gateway.resume_url()))
        .await
        .unwrap();
    conn.send_json(interaction_create(2, "111", "itok", "ping"))
        .await
        .unwrap();

    let callback = gateway.next_callback().await.unwrap();
    assert_eq!(callback.interaction_id, "111");
    assert_eq!(callback.token, "itok");
    assert_eq!(
        callback.body,
        json!({"type": 4, "data": {"content": "PONG"}})
    );

    bot.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unknown_command_is_ignored() {
    let mut gateway = MockGateway::start().await.unwrap();
    let bot = RunningBot::spawn(ping_bot(&gateway));
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_json(interaction_create(1, "1", "t1", "nope"))
        .await
        .unwrap();
    conn.send_json(interaction_create(2, "2", "t2", "ping"))
        .await
        .unwrap();

    let callback = gateway.next_callback().await.unwrap();
    assert_eq!(callback.interaction_id, "2");

    bot.stop().await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_commands_start_in_receipt_order() {
    let mut gateway = MockGateway::start().await.unwrap();
    let started = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let log = started.clone();

    let mut bot = Bot::new(gateway.config());
    bot.command("record", move |ctx: CommandContext| {
        let log = log.clone();
        async move {
            log.lock().await.push(ctx.interaction_id().to_string());
            ctx.send_content("ok").await
        }
    });
    let bot = RunningBot::spawn(bot);
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    for (seq, id) in [(1, "1"), (2, "2"), (3, "3")] {
        conn.send_json(interaction_create(seq, id, "tok", "record"))
            .await
            .unwrap();
    }

    for _ in 0..3 {
        gateway.next_callback().await.unwrap();
    }
    assert_eq!(*started.lock().await, vec!["1", "2", "3"]);

    bot.stop().await.unwrap().unwrap();
}

#[tokio::test]
async fn test_slow_handler_does_not_block() {
    let mut gateway = MockGateway::start().await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut bot = Bot::new(gateway.config());
    bot.command("ping", move |ctx: CommandContext| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(300)).await;
            ctx.send_content("PONG").await
        }
    });
    let bot = RunningBot::spawn(bot);
    let mut conn = gateway.accept().await.unwrap();

    conn.handshake(45_000).await.unwrap();
    conn.send_json(interaction_create(1, "1", "t1", "ping"))
        .await
        .unwrap();
    conn.send_json(interaction_create(2, "2", "t2", "ping"))
        .await
        .unwrap();

    // The read loop keeps going while both handlers sleep
    conn.send_json(heartbeat_request()).await.unwrap();
    assert_eq!(conn.recv_op(1).await.unwrap()["d"], 2);

    let mut ids = HashSet::new();
    ids.insert(gateway.next_callback().await.unwrap().interaction_id);
    ids.insert(gateway.next_callback().await.unwrap().interaction_id);

    assert_eq!(ids, HashSet::from(["1".to_string(), "2".to_string()]));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    bot.stop().await.unwrap().unwrap();
}
