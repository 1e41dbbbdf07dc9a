//! Client Integration Tests
//!
//! The full client (cache, REST dispatcher and shards) on top of the scripted
//! HTTP client and the fake gateway.
//!
//! Run with: cargo test -p integration-tests --test client_tests

use std::time::Duration;

use chord_cache::{EntityCache, WriteOutcome};
use chord_common::{CacheConfig, ClientError, ShardCount};
use chord_core::{Guild, MemberKey, Snowflake, User, Version};
use chord_gateway::protocol::{PresenceUpdatePayload, Status};
use chord_gateway::OpCode;
use chord_rest::RateLimitScope;
use integration_tests::*;
use serde_json::{json, Value};
use tokio::time::Instant;

const MESSAGES: &str = "/channels/11/messages";

fn message(content: &str) -> Value {
    json!({
        "id": "500",
        "channel_id": "11",
        "guild_id": "100",
        "author": user(1, "chord"),
        "content": content
    })
}

fn window(remaining: &str) -> Scripted {
    Scripted::json(200, message("ok"))
        .header("x-ratelimit-limit", "5")
        .header("x-ratelimit-remaining", remaining)
        .header("x-ratelimit-reset-after", "10")
        .header("x-ratelimit-bucket", "abc123")
}

// ============================================================================
// REST
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_bucket_with_one_remaining_holds_second_request() {
    let http = MockHttp::new();
    http.respond_with(MESSAGES, window("1"));
    http.respond_with(MESSAGES, window("0"));
    http.respond_with(MESSAGES, window("4"));
    let (connector, _accepted) = FakeConnector::new();
    let client = client(ShardCount::Fixed(1), &http, &connector).await.unwrap();
    let channel = Snowflake::new(11);

    client.create_message(channel, "warm up").await.unwrap();
    let known = Instant::now();

    let (a, b) = tokio::join!(
        client.create_message(channel, "a"),
        client.create_message(channel, "b")
    );
    a.unwrap();
    b.unwrap();

    let calls = http.calls(MESSAGES);
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].at, known);
    assert_eq!(calls[1].body, Some(json!({ "content": "a" })));
    assert!(calls[2].at - known >= Duration::from_secs(10));
    assert_eq!(calls[2].body, Some(json!({ "content": "b" })));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_request_is_replayed() {
    let http = MockHttp::new();
    http.respond_with(
        MESSAGES,
        Scripted::json(429, rate_limited(2.0, false))
            .header("retry-after", "2")
            .header("x-ratelimit-scope", "user"),
    );
    http.respond(MESSAGES, 200, message("hi"));
    let (connector, _accepted) = FakeConnector::new();
    let client = client(ShardCount::Fixed(1), &http, &connector).await.unwrap();
    let mut limits = client.rate_limits();

    let start = Instant::now();
    let sent = client.create_message(Snowflake::new(11), "hi").await.unwrap();

    assert_eq!(sent.content, "hi");
    let calls = http.calls(MESSAGES);
    assert_eq!(calls.len(), 2);
    assert!(calls[1].at - start >= Duration::from_secs(2));

    let event = limits.try_recv().unwrap();
    assert!(!event.global);
    assert_eq!(event.retry_after, Duration::from_secs(2));
    assert!(matches!(event.scope, Some(RateLimitScope::User)));
}

#[tokio::test(start_paused = true)]
async fn test_fetches_fill_cache() {
    let http = MockHttp::new();
    http.respond("/channels/11", 200, channel(11, 100, "general"));
    http.respond(
        "/guilds/100/members/20",
        200,
        json!({ "user": user(20, "nelly"), "roles": ["100"], "nick": "nel" }),
    );
    http.respond("/channels/11/messages/500", 200, message("stored"));
    let (connector, _accepted) = FakeConnector::new();
    let client = client(ShardCount::Fixed(1), &http, &connector).await.unwrap();

    let fetched = client.fetch_channel(Snowflake::new(11)).await.unwrap();
    assert_eq!(fetched.name.as_deref(), Some("general"));

    let key = MemberKey::new(Snowflake::new(100), Snowflake::new(20));
    let member = client.fetch_member(key).await.unwrap();
    assert_eq!(member.nick.as_deref(), Some("nel"));
    assert_eq!(client.cache().resolve::<User>(&Snowflake::new(20)).unwrap().username, "nelly");

    let stored = client
        .fetch_message(Snowflake::new(11), Snowflake::new(500))
        .await
        .unwrap();
    assert_eq!(client.cache().author_of_message(stored.id).unwrap().username, "chord");
}

#[tokio::test(start_paused = true)]
async fn test_api_error_surfaces() {
    let http = MockHttp::new();
    http.respond("/users/42", 404, json!({ "message": "Unknown User", "code": 10013 }));
    let (connector, _accepted) = FakeConnector::new();
    let client = client(ShardCount::Fixed(1), &http, &connector).await.unwrap();

    let err = client.fetch_user(Snowflake::new(42)).await.unwrap_err();

    assert!(matches!(err, ClientError::Http { status: 404, ref message } if message == "Unknown User"));
    assert_eq!(http.calls("/users/42").len(), 1);
}

// ============================================================================
// Cache ordering
// ============================================================================

#[test]
fn test_older_version_never_replaces_newer() {
    let cache = EntityCache::new(CacheConfig::default());
    let id = Snowflake::new(100);

    assert_eq!(cache.apply_snapshot(Guild::new(id, "five"), Version::new(5)), WriteOutcome::Applied);
    assert_eq!(cache.apply_snapshot(Guild::new(id, "three"), Version::new(3)), WriteOutcome::Stale);

    assert_eq!(cache.resolve::<Guild>(&id).unwrap().name, "five");
}

#[tokio::test(start_paused = true)]
async fn test_rest_response_loses_to_newer_dispatch() {
    let http = MockHttp::new();
    http.respond_with(
        "/guilds/100",
        Scripted::json(200, guild(100, "stale")).delayed(Duration::from_secs(1)),
    );
    let (connector, mut accepted) = FakeConnector::new();
    let client = client(ShardCount::Fixed(1), &http, &connector).await.unwrap();
    let mut events = client.subscribe();
    client.start();

    let mut conn = accepted.next().await;
    conn.handshake().await;
    conn.ready(0, 1, 1);
    wait_for_sequence(&mut events, 0, 1).await;

    let fetch = tokio::spawn({
        let client = client.clone();
        async move { client.fetch_guild(Snowflake::new(100)).await }
    });
    while http.calls("/guilds/100").is_empty() {
        tokio::task::yield_now().await;
    }

    // arrives while the request is in flight
    conn.dispatch("GUILD_CREATE", 2, guild_create(100, "fresh"));
    wait_for_sequence(&mut events, 0, 2).await;

    let fetched = fetch.await.unwrap().unwrap();
    assert_eq!(fetched.name, "fresh");
    assert_eq!(
        client.cache().resolve::<Guild>(&Snowflake::new(100)).unwrap().name,
        "fresh"
    );

    client.shutdown().await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_auto_sharding_connects_every_shard() {
    let http = MockHttp::new();
    http.respond("/gateway/bot", 200, gateway_bot(2, 2));
    let (connector, mut accepted) = FakeConnector::new();
    let client = client(ShardCount::Auto, &http, &connector).await.unwrap();
    let mut events = client.subscribe();
    client.start();

    let conns = accepted.identify_all(2).await;
    for (shard_id, (conn, identify)) in conns.iter().enumerate() {
        assert_eq!(conn.url(), connect_url(GATEWAY_URL));
        assert_eq!(identify.shard, [shard_id as u32, 2]);
        conn.ready(shard_id as u32, 2, 1);
    }
    wait_for_sequence(&mut events, 0, 1).await;

    client
        .update_presence(PresenceUpdatePayload::new(Status::Dnd))
        .await
        .unwrap();
    for (mut conn, _) in conns {
        let presence = conn.expect_op(OpCode::PresenceUpdate).await;
        assert_eq!(presence.d["status"], "dnd");
    }

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_rest_then_rejects() {
    let http = MockHttp::new();
    http.respond_with(
        "/users/@me",
        Scripted::json(200, user(1, "chord")).delayed(Duration::from_secs(3)),
    );
    let (connector, _accepted) = FakeConnector::new();
    let client = client(ShardCount::Fixed(1), &http, &connector).await.unwrap();

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.fetch_current_user().await }
    });
    while http.calls("/users/@me").is_empty() {
        tokio::task::yield_now().await;
    }

    client.shutdown().await;

    assert_eq!(pending.await.unwrap().unwrap().username, "chord");
    let err = client.fetch_current_user().await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
}
