//! Typed gateway events
//!
//! A closed set of events the client understands; anything else arrives as
//! [`GatewayEvent::Unknown`] with its raw data intact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EventKind;
use crate::entities::{Channel, Guild, Member, Message, Role, UnavailableGuild, User};
use crate::value_objects::Snowflake;

/// Fields present in a partial update, keyed by wire name
pub type Patch = Map<String, Value>;

// === Connection Events ===

/// READY event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ready {
    /// Gateway protocol version
    pub v: u8,
    /// Current user
    pub user: User,
    /// Guilds the user is in (initially unavailable)
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    /// Session ID for resuming
    pub session_id: String,
    /// Gateway URL for resuming
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    /// `[shard_id, num_shards]` echoed back from Identify
    #[serde(default)]
    pub shard: Option<[u32; 2]>,
}

// === Guild Events ===

/// GUILD_CREATE split into per-kind snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct GuildCreate {
    pub guild: Guild,
    pub channels: Vec<Channel>,
    pub roles: Vec<Role>,
    pub members: Vec<Member>,
    pub users: Vec<User>,
}

/// A page of members sent in response to Request Guild Members
#[derive(Debug, Clone, PartialEq)]
pub struct MembersChunk {
    pub guild_id: Snowflake,
    pub members: Vec<Member>,
    pub users: Vec<User>,
    pub chunk_index: u32,
    pub chunk_count: u32,
    pub nonce: Option<String>,
}

/// Typed dispatch event
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Ready(Box<Ready>),
    Resumed,

    GuildCreate(Box<GuildCreate>),
    /// Guild came back from an outage but its data is not yet available
    GuildUnavailable(UnavailableGuild),
    GuildUpdate { id: Snowflake, patch: Patch },
    GuildDelete(UnavailableGuild),

    ChannelCreate(Channel),
    ChannelUpdate(Channel),
    ChannelDelete(Channel),

    RoleCreate { guild_id: Snowflake, role: Role },
    RoleUpdate { guild_id: Snowflake, role: Role },
    RoleDelete { guild_id: Snowflake, role_id: Snowflake },

    MemberAdd { member: Member, user: User },
    MemberUpdate { guild_id: Snowflake, user: User, patch: Patch },
    MemberRemove { guild_id: Snowflake, user: User },
    MembersChunk(Box<MembersChunk>),

    MessageCreate { message: Message, author: User },
    MessageUpdate { id: Snowflake, channel_id: Snowflake, patch: Patch },
    MessageDelete {
        id: Snowflake,
        channel_id: Snowflake,
        guild_id: Option<Snowflake>,
    },

    UserUpdate(User),

    /// An event with no typed decoding
    Unknown { name: String, data: Value },
}

impl GatewayEvent {
    /// The kind of a typed event, `None` for [`GatewayEvent::Unknown`]
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        let kind = match self {
            Self::Ready(_) => EventKind::Ready,
            Self::Resumed => EventKind::Resumed,
            Self::GuildCreate(_) | Self::GuildUnavailable(_) => EventKind::GuildCreate,
            Self::GuildUpdate { .. } => EventKind::GuildUpdate,
            Self::GuildDelete(_) => EventKind::GuildDelete,
            Self::ChannelCreate(_) => EventKind::ChannelCreate,
            Self::ChannelUpdate(_) => EventKind::ChannelUpdate,
            Self::ChannelDelete(_) => EventKind::ChannelDelete,
            Self::RoleCreate { .. } => EventKind::GuildRoleCreate,
            Self::RoleUpdate { .. } => EventKind::GuildRoleUpdate,
            Self::RoleDelete { .. } => EventKind::GuildRoleDelete,
            Self::MemberAdd { .. } => EventKind::GuildMemberAdd,
            Self::MemberUpdate { .. } => EventKind::GuildMemberUpdate,
            Self::MemberRemove { .. } => EventKind::GuildMemberRemove,
            Self::MembersChunk(_) => EventKind::GuildMembersChunk,
            Self::MessageCreate { .. } => EventKind::MessageCreate,
            Self::MessageUpdate { .. } => EventKind::MessageUpdate,
            Self::MessageDelete { .. } => EventKind::MessageDelete,
            Self::UserUpdate(_) => EventKind::UserUpdate,
            Self::Unknown { .. } => return None,
        };
        Some(kind)
    }

    /// The wire name of the event
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Unknown { name, .. } => name,
            other => other.kind().map_or("UNKNOWN", EventKind::as_str),
        }
    }
}
