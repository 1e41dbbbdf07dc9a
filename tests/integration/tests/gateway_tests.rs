//! Gateway Integration Tests
//!
//! Sessions and the shard coordinator driven through the fake connector with
//! a paused clock.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::collections::HashSet;
use std::time::Duration;

use chord_common::ClientError;
use chord_core::{Guild, Snowflake};
use chord_gateway::protocol::{PresenceUpdatePayload, RequestGuildMembersPayload, Status};
use chord_gateway::{
    max_first_beat_jitter, GatewayCommand, GatewayMessage, OpCode, SessionState, ShardEvent,
};
use integration_tests::*;
use serde_json::json;
use tokio::time::Instant;

fn connected(shard: u32) -> impl FnMut(&ShardEvent) -> bool {
    move |event| {
        matches!(
            event,
            ShardEvent::StateChanged { shard_id, state: SessionState::Connected } if *shard_id == shard
        )
    }
}

fn typing() -> serde_json::Value {
    json!({ "channel_id": "101", "user_id": "20" })
}

// ============================================================================
// Handshake and heartbeat
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_identify_ready_then_heartbeat_carries_sequence() {
    let mut gateway = TestGateway::new(1, 1);
    gateway.coordinator.start();

    let mut conn = gateway.accepted.next().await;
    assert_eq!(conn.url(), connect_url(GATEWAY_URL));

    let hello_at = Instant::now();
    let identify = conn.handshake().await;
    assert_eq!(identify.token, "token");
    assert_eq!(identify.shard, [0, 1]);

    conn.ready(0, 1, 1);
    wait_for(&mut gateway.events, connected(0)).await;

    let (beat_at, seq) = conn.expect_heartbeat().await;
    assert_eq!(seq, Some(1));
    let interval = Duration::from_millis(HEARTBEAT_INTERVAL_MS);
    let waited = beat_at - hello_at;
    assert!(waited >= interval - max_first_beat_jitter(interval));
    assert!(waited <= interval);

    let status = gateway.coordinator.shard(0).unwrap().status();
    assert_eq!(status.state, SessionState::Connected);
    assert_eq!(status.session_id, Some(session_id(0)));
    assert_eq!(gateway.cache.current_user().unwrap().username, "chord");

    gateway.coordinator.shutdown().await;
    let (_, code) = conn.expect_close().await;
    assert_eq!(code, 1000);
}

#[tokio::test(start_paused = true)]
async fn test_sequence_keeps_maximum() {
    let mut gateway = TestGateway::new(1, 1);
    let mut conn = gateway.connect_single().await;

    conn.dispatch("TYPING_START", 5, typing());
    conn.dispatch("TYPING_START", 3, typing());
    wait_for_sequence(&mut gateway.events, 0, 3).await;

    let status = gateway.coordinator.shard(0).unwrap().status();
    assert_eq!(status.sequence, Some(5));

    let (_, seq) = conn.expect_heartbeat().await;
    assert_eq!(seq, Some(5));
}

#[tokio::test(start_paused = true)]
async fn test_requested_heartbeat_and_latency() {
    let mut gateway = TestGateway::new(1, 1);
    let mut conn = gateway.connect_single().await;

    let requested_at = Instant::now();
    conn.send(&GatewayMessage::heartbeat(None));
    let (beat_at, seq) = conn.expect_heartbeat().await;
    assert_eq!(beat_at, requested_at);
    assert_eq!(seq, Some(1));

    tokio::time::advance(Duration::from_millis(120)).await;
    conn.send(&GatewayMessage::heartbeat_ack());
    // frames are handled in order, so the ack is recorded once this lands
    conn.dispatch("TYPING_START", 2, typing());
    wait_for_sequence(&mut gateway.events, 0, 2).await;

    let status = gateway.coordinator.shard(0).unwrap().status();
    assert_eq!(status.latency, Some(Duration::from_millis(120)));
}

#[tokio::test(start_paused = true)]
async fn test_missing_ack_zombies_and_resumes() {
    let mut gateway = TestGateway::new(1, 1);
    let mut conn = gateway.connect_single().await;

    let (beat_at, _) = conn.expect_heartbeat().await;
    // never acknowledged
    let (closed_at, code) = conn.expect_close().await;

    assert_eq!(code, 4000);
    let waited = closed_at - beat_at;
    assert!(waited >= Duration::from_millis(HEARTBEAT_INTERVAL_MS));
    assert!(waited < Duration::from_millis(HEARTBEAT_INTERVAL_MS + 1_000));

    let mut next = gateway.accepted.next().await;
    assert_eq!(next.url(), connect_url(RESUME_URL));
    next.hello();
    let resume = next.expect_resume().await;
    assert_eq!(resume.session_id, session_id(0));
    assert_eq!(resume.seq, 1);
}

// ============================================================================
// Resume and re-identify
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_resumable_close_resumes_session() {
    let mut gateway = TestGateway::new(1, 1);
    let mut conn = gateway.connect_single().await;
    conn.dispatch("TYPING_START", 2, typing());
    wait_for_sequence(&mut gateway.events, 0, 2).await;

    conn.close(4000);
    let (_, code) = conn.expect_close().await;
    assert_eq!(code, 4000);

    let mut resumed = gateway.accepted.next().await;
    assert_eq!(resumed.url(), connect_url(RESUME_URL));
    resumed.hello();
    let resume = resumed.expect_resume().await;
    assert_eq!(resume.token, "token");
    assert_eq!(resume.session_id, session_id(0));
    assert_eq!(resume.seq, 2);

    resumed.dispatch("RESUMED", 3, json!({}));
    wait_for_sequence(&mut gateway.events, 0, 3).await;

    let status = gateway.coordinator.shard(0).unwrap().status();
    assert_eq!(status.state, SessionState::Connected);
    assert_eq!(status.session_id, Some(session_id(0)));
    assert_eq!(status.sequence, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_request_resumes() {
    let mut gateway = TestGateway::new(1, 1);
    let mut conn = gateway.connect_single().await;

    conn.send(&GatewayMessage::reconnect());
    let (_, code) = conn.expect_close().await;
    assert_eq!(code, 4000);

    let mut next = gateway.accepted.next().await;
    next.hello();
    assert_eq!(next.expect_resume().await.seq, 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_lost_close_reidentifies() {
    let mut gateway = TestGateway::new(1, 1);
    let mut conn = gateway.connect_single().await;

    // invalid seq
    conn.close(4007);
    conn.expect_close().await;

    let mut next = gateway.accepted.next().await;
    assert_eq!(next.url(), connect_url(GATEWAY_URL));
    let identify = next.handshake().await;
    assert_eq!(identify.shard, [0, 1]);

    let status = gateway.coordinator.shard(0).unwrap().status();
    assert_eq!(status.session_id, None);
    assert_eq!(status.sequence, None);
    assert_eq!(status.state, SessionState::Identifying);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_session_reidentifies_after_delay() {
    let mut gateway = TestGateway::new(1, 1);
    let mut conn = gateway.connect_single().await;

    conn.send(&GatewayMessage::invalid_session(false));
    let (closed_at, code) = conn.expect_close().await;
    assert_eq!(code, 1000);

    let mut next = gateway.accepted.next().await;
    let waited = Instant::now() - closed_at;
    assert!(waited >= Duration::from_secs(1), "reconnected after {waited:?}");
    assert!(waited <= Duration::from_secs(5), "reconnected after {waited:?}");

    next.handshake().await;
    assert_eq!(gateway.coordinator.shard(0).unwrap().status().session_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_resumable_invalid_session_keeps_session() {
    let mut gateway = TestGateway::new(1, 1);
    let mut conn = gateway.connect_single().await;

    conn.send(&GatewayMessage::invalid_session(true));
    let (_, code) = conn.expect_close().await;
    assert_eq!(code, 4000);

    let mut next = gateway.accepted.next().await;
    next.hello();
    let resume = next.expect_resume().await;
    assert_eq!(resume.session_id, session_id(0));
}

// ============================================================================
// Coordinator
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_identify_concurrency_is_bounded() {
    let mut gateway = TestGateway::new(5, 2);
    let spacing = Duration::from_secs(5);
    let start = Instant::now();
    gateway.coordinator.start();

    let mut identified = Vec::new();
    let mut conns = Vec::new();
    for _ in 0..5 {
        let mut conn = gateway.accepted.next().await;
        let identify = conn.handshake().await;
        assert!(gateway.coordinator.identifies_in_flight() <= 2);
        identified.push((Instant::now(), identify.shard[0]));
        conns.push(conn);
    }

    let shards: HashSet<u32> = identified.iter().map(|(_, shard)| *shard).collect();
    assert_eq!(shards.len(), 5);

    for (at, _) in &identified {
        let in_window = identified
            .iter()
            .filter(|(other, _)| *other >= *at && *other - *at < spacing)
            .count();
        assert!(in_window <= 2, "{in_window} identifies within {spacing:?} of {at:?}");
    }
    for (a_at, a) in &identified {
        for (b_at, b) in &identified {
            if a != b && a % 2 == b % 2 && b_at > a_at {
                assert!(*b_at - *a_at >= spacing, "shards {a} and {b} share a key");
            }
        }
    }
    assert!(Instant::now() - start >= spacing * 2);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_close_terminates_one_shard() {
    let mut gateway = TestGateway::new(2, 2);
    gateway.coordinator.start();

    let mut conns = gateway.accepted.identify_all(2).await;
    let (healthy, _) = conns.pop().unwrap();
    let (doomed, identify) = conns.pop().unwrap();
    assert_eq!(identify.shard, [0, 2]);

    healthy.ready(1, 2, 1);
    doomed.close(4004);

    let event = wait_for(&mut gateway.events, |event| {
        matches!(event, ShardEvent::Terminated { .. })
    })
    .await;
    let ShardEvent::Terminated { shard_id, error } = event else {
        unreachable!()
    };
    assert_eq!(shard_id, 0);
    assert!(matches!(error.as_ref(), ClientError::FatalClose { code: 4004 }));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(gateway.accepted.try_next().is_none(), "terminated shard reconnected");

    let statuses = gateway.coordinator.statuses();
    assert_eq!(statuses[0].state, SessionState::Disconnected);
    assert_eq!(statuses[1].state, SessionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_failed_attempts() {
    let mut gateway = TestGateway::with_attempts(1, 1, 3);
    gateway.connector.refuse_connections();
    gateway.coordinator.start();

    let event = wait_for(&mut gateway.events, |event| {
        matches!(event, ShardEvent::Terminated { .. })
    })
    .await;
    let ShardEvent::Terminated { error, .. } = event else {
        unreachable!()
    };
    assert_eq!(error.kind(), "TRANSIENT");
    assert!(error.to_string().contains("3 attempts"));
}

#[tokio::test(start_paused = true)]
async fn test_commands_wait_for_connected() {
    let mut gateway = TestGateway::new(1, 1);
    gateway.coordinator.start();
    let mut conn = gateway.accepted.next().await;
    conn.handshake().await;

    gateway
        .coordinator
        .send(GatewayCommand::PresenceUpdate(PresenceUpdatePayload::new(Status::Idle)))
        .await
        .unwrap();
    tokio::task::yield_now().await;
    assert!(conn.try_next().is_none());

    conn.ready(0, 1, 1);
    let presence = conn.expect_op(OpCode::PresenceUpdate).await;
    assert_eq!(presence.d["status"], "idle");

    gateway
        .coordinator
        .send(GatewayCommand::RequestGuildMembers(RequestGuildMembersPayload::all(
            Snowflake::new(100),
        )))
        .await
        .unwrap();
    let request = conn.expect_op(OpCode::RequestGuildMembers).await;
    assert_eq!(request.d["guild_id"], "100");
}

#[tokio::test(start_paused = true)]
async fn test_dispatches_feed_cache() {
    let mut gateway = TestGateway::new(1, 1);
    let conn = gateway.connect_single().await;

    conn.dispatch("GUILD_CREATE", 2, guild_create(100, "guild"));
    wait_for_sequence(&mut gateway.events, 0, 2).await;

    let guild_id = Snowflake::new(100);
    let guild = gateway.cache.resolve::<Guild>(&guild_id).unwrap();
    assert_eq!(guild.name, "guild");
    assert_eq!(gateway.cache.channels_of_guild(guild_id).len(), 1);
    assert_eq!(gateway.cache.members_of_guild(guild_id).len(), 1);

    conn.dispatch("GUILD_DELETE", 3, json!({ "id": "100" }));
    wait_for_sequence(&mut gateway.events, 0, 3).await;

    assert!(gateway.cache.resolve::<Guild>(&guild_id).is_none());
    assert!(gateway.cache.channels_of_guild(guild_id).is_empty());
}
