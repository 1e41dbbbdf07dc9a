//! Role model

use serde::{Deserialize, Serialize};

use super::{Identifiable, EntityKind, GuildScoped};
use crate::value_objects::Snowflake;

/// Role snapshot
///
/// Role payloads do not carry their guild; the cache fills `guild_id` from the
/// enclosing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub position: i32,
    /// Permission bitfield as sent by the platform (decimal string)
    #[serde(default)]
    pub permissions: String,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
}

impl Role {
    /// Create a role snapshot
    pub fn new(id: Snowflake, guild_id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            guild_id: Some(guild_id),
            name: name.into(),
            color: 0,
            position: 0,
            permissions: "0".to_string(),
            managed: false,
            mentionable: false,
        }
    }

    /// The @everyone role shares its id with the guild
    pub fn is_everyone(&self) -> bool {
        self.guild_id == Some(self.id)
    }

    /// Attach the owning guild
    #[must_use]
    pub fn in_guild(mut self, guild_id: Snowflake) -> Self {
        self.guild_id = Some(guild_id);
        self
    }
}

impl Identifiable for Role {
    type Key = Snowflake;

    const KIND: EntityKind = EntityKind::Role;

    fn key(&self) -> Snowflake {
        self.id
    }
}

impl GuildScoped for Role {
    fn guild_id(&self) -> Option<Snowflake> {
        self.guild_id
    }
}
