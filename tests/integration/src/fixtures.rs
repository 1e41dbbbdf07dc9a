//! Gateway and REST payloads used across the scenarios

use serde_json::{json, Value};

/// Gateway URL the doubles are configured with
pub const GATEWAY_URL: &str = "wss://gateway.test";

/// Resume URL handed out in READY
pub const RESUME_URL: &str = "wss://resume.test";

/// Heartbeat interval sent in Hello
pub const HEARTBEAT_INTERVAL_MS: u64 = 45_000;

/// The URL a session connects to for a base gateway URL
pub fn connect_url(base: &str) -> String {
    format!("{base}/?v=10&encoding=json")
}

/// Session id READY assigns to a shard
pub fn session_id(shard_id: u32) -> String {
    format!("session-{shard_id}")
}

pub fn user(id: u64, username: &str) -> Value {
    json!({
        "id": id.to_string(),
        "username": username,
        "discriminator": "0",
        "bot": false
    })
}

/// READY for `[shard_id, shard_count]` with one unavailable guild
pub fn ready(shard_id: u32, shard_count: u32) -> Value {
    json!({
        "v": 10,
        "user": { "id": "1", "username": "chord", "discriminator": "0", "bot": true },
        "guilds": [{ "id": "100", "unavailable": true }],
        "session_id": session_id(shard_id),
        "resume_gateway_url": RESUME_URL,
        "shard": [shard_id, shard_count]
    })
}

/// GUILD_CREATE with one text channel, one role and one member
pub fn guild_create(guild_id: u64, name: &str) -> Value {
    json!({
        "id": guild_id.to_string(),
        "name": name,
        "member_count": 1,
        "channels": [{ "id": (guild_id + 1).to_string(), "type": 0, "name": "general" }],
        "threads": [],
        "roles": [{ "id": guild_id.to_string(), "name": "@everyone", "permissions": "0" }],
        "members": [{ "user": user(20, "nelly"), "roles": [guild_id.to_string()] }]
    })
}

pub fn guild(guild_id: u64, name: &str) -> Value {
    json!({ "id": guild_id.to_string(), "name": name })
}

pub fn channel(channel_id: u64, guild_id: u64, name: &str) -> Value {
    json!({
        "id": channel_id.to_string(),
        "type": 0,
        "guild_id": guild_id.to_string(),
        "name": name
    })
}

/// `GET /gateway/bot`
pub fn gateway_bot(shards: u32, max_concurrency: u32) -> Value {
    json!({
        "url": GATEWAY_URL,
        "shards": shards,
        "session_start_limit": {
            "total": 1000,
            "remaining": 999,
            "reset_after": 14_400_000,
            "max_concurrency": max_concurrency
        }
    })
}

/// 429 body as the platform sends it
pub fn rate_limited(retry_after: f64, global: bool) -> Value {
    json!({
        "message": "You are being rate limited.",
        "retry_after": retry_after,
        "global": global
    })
}
