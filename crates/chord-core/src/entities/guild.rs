//! Guild model

use serde::{Deserialize, Serialize};

use super::{Identifiable, EntityKind};
use crate::value_objects::Snowflake;

/// Guild (server) snapshot
///
/// Only the scalar fields are kept here; channels, roles and members that arrive
/// inside GUILD_CREATE are split into their own stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub member_count: Option<u64>,
    #[serde(default)]
    pub large: bool,
    #[serde(default)]
    pub unavailable: bool,
}

impl Guild {
    /// Create a minimal guild snapshot
    pub fn new(id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            icon: None,
            description: None,
            owner_id: None,
            member_count: None,
            large: false,
            unavailable: false,
        }
    }

    /// Check if a user is the guild owner
    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == Some(user_id)
    }

    /// Check whether the member list exceeds the given threshold
    ///
    /// Falls back to the platform's `large` flag when no count is known.
    pub fn exceeds_member_threshold(&self, threshold: u64) -> bool {
        match self.member_count {
            Some(count) => count > threshold,
            None => self.large,
        }
    }
}

impl Identifiable for Guild {
    type Key = Snowflake;

    const KIND: EntityKind = EntityKind::Guild;

    fn key(&self) -> Snowflake {
        self.id
    }
}

/// Guild entry in READY, or a GUILD_DELETE during an outage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}
