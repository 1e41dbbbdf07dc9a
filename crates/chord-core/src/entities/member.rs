//! Member model - a user's membership in a guild

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Identifiable, EntityKind, GuildScoped};
use crate::value_objects::Snowflake;

/// Identity of a member: the (guild, user) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberKey {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
}

impl MemberKey {
    pub const fn new(guild_id: Snowflake, user_id: Snowflake) -> Self {
        Self { guild_id, user_id }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.user_id)
    }
}

/// Member snapshot
///
/// The embedded user object of the wire payload is stored in the user store;
/// only its id is kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<String>,
    #[serde(default)]
    pub pending: bool,
}

impl Member {
    /// Create a member snapshot
    pub fn new(guild_id: Snowflake, user_id: Snowflake) -> Self {
        Self {
            guild_id,
            user_id,
            nick: None,
            roles: Vec::new(),
            joined_at: None,
            pending: false,
        }
    }

    /// Get display name (nickname if set, otherwise fallback)
    pub fn display_name<'a>(&'a self, username: &'a str) -> &'a str {
        self.nick.as_deref().unwrap_or(username)
    }

    /// Check if member has a specific role
    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }
}

impl Identifiable for Member {
    type Key = MemberKey;

    const KIND: EntityKind = EntityKind::Member;

    fn key(&self) -> MemberKey {
        MemberKey::new(self.guild_id, self.user_id)
    }
}

impl GuildScoped for Member {
    fn guild_id(&self) -> Option<Snowflake> {
        Some(self.guild_id)
    }
}
