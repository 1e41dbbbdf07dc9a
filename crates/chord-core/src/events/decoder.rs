//! Dispatch decoding
//!
//! The decoder maps an event name to a decoding function through a table built
//! once. Names without an entry decode to [`GatewayEvent::Unknown`].

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::event::{GatewayEvent, GuildCreate, MembersChunk, Patch, Ready};
use super::EventKind;
use crate::entities::{Channel, Guild, Member, Message, Role, UnavailableGuild, User};
use crate::value_objects::Snowflake;

type DecodeFn = fn(Value) -> Result<GatewayEvent, serde_json::Error>;

/// A known event whose data did not match its shape
#[derive(Debug, thiserror::Error)]
#[error("failed to decode {event}: {source}")]
pub struct DecodeError {
    pub event: String,
    #[source]
    pub source: serde_json::Error,
}

/// Event name to decoding function table
#[derive(Debug, Clone)]
pub struct EventDecoder {
    table: HashMap<&'static str, DecodeFn>,
}

impl EventDecoder {
    /// Build the table for every [`EventKind`]
    #[must_use]
    pub fn new() -> Self {
        let table = EventKind::ALL
            .into_iter()
            .map(|kind| (kind.as_str(), decoder_for(kind)))
            .collect();
        Self { table }
    }

    /// Decode the data of a dispatch frame
    ///
    /// # Errors
    /// Returns `DecodeError` when a known event carries malformed data.
    pub fn decode(&self, name: &str, data: Value) -> Result<GatewayEvent, DecodeError> {
        match self.table.get(name) {
            Some(decode) => decode(data).map_err(|source| DecodeError {
                event: name.to_string(),
                source,
            }),
            None => Ok(GatewayEvent::Unknown {
                name: name.to_string(),
                data,
            }),
        }
    }

    /// Check whether a name has a typed decoding
    #[must_use]
    pub fn is_known(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn decoder_for(kind: EventKind) -> DecodeFn {
    match kind {
        EventKind::Ready => decode_ready,
        EventKind::Resumed => |_| Ok(GatewayEvent::Resumed),
        EventKind::GuildCreate => decode_guild_create,
        EventKind::GuildUpdate => decode_guild_update,
        EventKind::GuildDelete => {
            |data| serde_json::from_value(data).map(GatewayEvent::GuildDelete)
        }
        EventKind::ChannelCreate => {
            |data| serde_json::from_value(data).map(GatewayEvent::ChannelCreate)
        }
        EventKind::ChannelUpdate => {
            |data| serde_json::from_value(data).map(GatewayEvent::ChannelUpdate)
        }
        EventKind::ChannelDelete => {
            |data| serde_json::from_value(data).map(GatewayEvent::ChannelDelete)
        }
        EventKind::GuildRoleCreate => decode_role_create,
        EventKind::GuildRoleUpdate => decode_role_update,
        EventKind::GuildRoleDelete => decode_role_delete,
        EventKind::GuildMemberAdd => decode_member_add,
        EventKind::GuildMemberUpdate => decode_member_update,
        EventKind::GuildMemberRemove => decode_member_remove,
        EventKind::GuildMembersChunk => decode_members_chunk,
        EventKind::MessageCreate => decode_message_create,
        EventKind::MessageUpdate => decode_message_update,
        EventKind::MessageDelete => decode_message_delete,
        EventKind::UserUpdate => |data| serde_json::from_value(data).map(GatewayEvent::UserUpdate),
    }
}

// === Wire shapes ===

/// Member as sent on the wire, with the user embedded
#[derive(Deserialize)]
struct WireMember {
    user: User,
    #[serde(default)]
    nick: Option<String>,
    #[serde(default)]
    roles: Vec<Snowflake>,
    #[serde(default)]
    joined_at: Option<String>,
    #[serde(default)]
    pending: bool,
}

impl WireMember {
    fn into_parts(self, guild_id: Snowflake) -> (Member, User) {
        let member = Member {
            guild_id,
            user_id: self.user.id,
            nick: self.nick,
            roles: self.roles,
            joined_at: self.joined_at,
            pending: self.pending,
        };
        (member, self.user)
    }
}

fn split_members(guild_id: Snowflake, wire: Vec<WireMember>) -> (Vec<Member>, Vec<User>) {
    wire.into_iter().map(|m| m.into_parts(guild_id)).unzip()
}

#[derive(Deserialize)]
struct WireGuildCreate {
    #[serde(flatten)]
    guild: Guild,
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    threads: Vec<Channel>,
    #[serde(default)]
    roles: Vec<Role>,
    #[serde(default)]
    members: Vec<WireMember>,
}

#[derive(Deserialize)]
struct WireRoleEvent {
    guild_id: Snowflake,
    role: Role,
}

#[derive(Deserialize)]
struct WireRoleDelete {
    guild_id: Snowflake,
    role_id: Snowflake,
}

#[derive(Deserialize)]
struct WireMemberAdd {
    guild_id: Snowflake,
    #[serde(flatten)]
    member: WireMember,
}

#[derive(Deserialize)]
struct WireMemberRef {
    guild_id: Snowflake,
    user: User,
}

#[derive(Deserialize)]
struct WireMembersChunk {
    guild_id: Snowflake,
    members: Vec<WireMember>,
    #[serde(default)]
    chunk_index: u32,
    #[serde(default = "one")]
    chunk_count: u32,
    #[serde(default)]
    nonce: Option<String>,
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
struct WireMessage {
    id: Snowflake,
    channel_id: Snowflake,
    #[serde(default)]
    guild_id: Option<Snowflake>,
    author: User,
    #[serde(default)]
    content: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    edited_timestamp: Option<String>,
    #[serde(default)]
    pinned: bool,
}

#[derive(Deserialize)]
struct WireMessageRef {
    id: Snowflake,
    channel_id: Snowflake,
    #[serde(default)]
    guild_id: Option<Snowflake>,
}

#[derive(Deserialize)]
struct WireId {
    id: Snowflake,
}

/// Turn an object into a patch, dropping fields that are not part of the model
fn into_patch(data: Value, strip: &[&str]) -> Result<Patch, serde_json::Error> {
    match data {
        Value::Object(mut map) => {
            for key in strip {
                map.remove(*key);
            }
            Ok(map)
        }
        other => Err(serde::de::Error::custom(format_args!(
            "expected an object, found {other}"
        ))),
    }
}

// === Resource bodies ===

/// Split a member object (as returned by the HTTP API) into member and user
pub fn member_from_wire(guild_id: Snowflake, data: Value) -> Result<(Member, User), serde_json::Error> {
    let wire: WireMember = serde_json::from_value(data)?;
    Ok(wire.into_parts(guild_id))
}

/// Split a message object into message and author
pub fn message_from_wire(data: Value) -> Result<(Message, User), serde_json::Error> {
    let wire: WireMessage = serde_json::from_value(data)?;
    let message = Message {
        id: wire.id,
        channel_id: wire.channel_id,
        guild_id: wire.guild_id,
        author_id: wire.author.id,
        content: wire.content,
        timestamp: wire.timestamp,
        edited_timestamp: wire.edited_timestamp,
        pinned: wire.pinned,
    };
    Ok((message, wire.author))
}

// === Decoders ===

fn decode_ready(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let ready: Ready = serde_json::from_value(data)?;
    Ok(GatewayEvent::Ready(Box::new(ready)))
}

fn decode_guild_create(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    if data.get("unavailable").and_then(Value::as_bool) == Some(true) {
        let guild: UnavailableGuild = serde_json::from_value(data)?;
        return Ok(GatewayEvent::GuildUnavailable(guild));
    }

    let wire: WireGuildCreate = serde_json::from_value(data)?;
    let guild_id = wire.guild.id;

    let channels = wire
        .channels
        .into_iter()
        .chain(wire.threads)
        .map(|mut channel| {
            channel.guild_id.get_or_insert(guild_id);
            channel
        })
        .collect();
    let roles = wire
        .roles
        .into_iter()
        .map(|role| role.in_guild(guild_id))
        .collect();
    let (members, users) = split_members(guild_id, wire.members);

    Ok(GatewayEvent::GuildCreate(Box::new(GuildCreate {
        guild: wire.guild,
        channels,
        roles,
        members,
        users,
    })))
}

fn decode_guild_update(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let WireId { id } = WireId::deserialize(&data)?;
    let patch = into_patch(data, &["channels", "threads", "roles", "members"])?;
    Ok(GatewayEvent::GuildUpdate { id, patch })
}

fn decode_role_create(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let wire: WireRoleEvent = serde_json::from_value(data)?;
    Ok(GatewayEvent::RoleCreate {
        guild_id: wire.guild_id,
        role: wire.role.in_guild(wire.guild_id),
    })
}

fn decode_role_update(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let wire: WireRoleEvent = serde_json::from_value(data)?;
    Ok(GatewayEvent::RoleUpdate {
        guild_id: wire.guild_id,
        role: wire.role.in_guild(wire.guild_id),
    })
}

fn decode_role_delete(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let wire: WireRoleDelete = serde_json::from_value(data)?;
    Ok(GatewayEvent::RoleDelete {
        guild_id: wire.guild_id,
        role_id: wire.role_id,
    })
}

fn decode_member_add(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let wire: WireMemberAdd = serde_json::from_value(data)?;
    let (member, user) = wire.member.into_parts(wire.guild_id);
    Ok(GatewayEvent::MemberAdd { member, user })
}

fn decode_member_update(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let WireMemberRef { guild_id, user } = WireMemberRef::deserialize(&data)?;
    let patch = into_patch(data, &["guild_id", "user"])?;
    Ok(GatewayEvent::MemberUpdate {
        guild_id,
        user,
        patch,
    })
}

fn decode_member_remove(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let WireMemberRef { guild_id, user } = serde_json::from_value(data)?;
    Ok(GatewayEvent::MemberRemove { guild_id, user })
}

fn decode_members_chunk(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let wire: WireMembersChunk = serde_json::from_value(data)?;
    let (members, users) = split_members(wire.guild_id, wire.members);
    Ok(GatewayEvent::MembersChunk(Box::new(MembersChunk {
        guild_id: wire.guild_id,
        members,
        users,
        chunk_index: wire.chunk_index,
        chunk_count: wire.chunk_count,
        nonce: wire.nonce,
    })))
}

fn decode_message_create(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let (message, author) = message_from_wire(data)?;
    Ok(GatewayEvent::MessageCreate { message, author })
}

fn decode_message_update(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let WireMessageRef { id, channel_id, .. } = WireMessageRef::deserialize(&data)?;
    let patch = into_patch(data, &["author", "member", "mentions"])?;
    Ok(GatewayEvent::MessageUpdate {
        id,
        channel_id,
        patch,
    })
}

fn decode_message_delete(data: Value) -> Result<GatewayEvent, serde_json::Error> {
    let WireMessageRef {
        id,
        channel_id,
        guild_id,
    } = serde_json::from_value(data)?;
    Ok(GatewayEvent::MessageDelete {
        id,
        channel_id,
        guild_id,
    })
}
