//! Cache models - the canonical snapshots held by the entity cache
//!
//! Models reference each other by id only. A member carries `guild_id` and
//! `user_id`, never a `Guild` or `User` value; relations are resolved by lookup.

mod channel;
mod guild;
mod member;
mod message;
mod role;
mod user;

pub use channel::{Channel, ChannelKind};
pub use guild::{Guild, UnavailableGuild};
pub use member::{Member, MemberKey};
pub use message::Message;
pub use role::Role;
pub use user::User;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

use crate::value_objects::Snowflake;

/// Kinds of entities the cache tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Guild,
    Channel,
    User,
    Member,
    Role,
    Message,
}

impl EntityKind {
    /// Get the name of this kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guild => "guild",
            Self::Channel => "channel",
            Self::User => "user",
            Self::Member => "member",
            Self::Role => "role",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model the cache can store
///
/// The key is the identity of the snapshot; most kinds use their own snowflake,
/// members use the (guild, user) pair.
pub trait Identifiable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Key: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    const KIND: EntityKind;

    fn key(&self) -> Self::Key;
}

/// Entities that belong to a guild
pub trait GuildScoped {
    fn guild_id(&self) -> Option<Snowflake>;
}
