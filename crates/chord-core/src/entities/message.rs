//! Message model

use serde::{Deserialize, Serialize};

use super::{Identifiable, EntityKind, GuildScoped};
use crate::value_objects::Snowflake;

/// Message snapshot
///
/// The author is stored in the user store; only `author_id` is kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author_id: Snowflake,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub edited_timestamp: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

impl Message {
    /// Create a message snapshot
    pub fn new(
        id: Snowflake,
        channel_id: Snowflake,
        author_id: Snowflake,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            channel_id,
            guild_id: None,
            author_id,
            content: content.into(),
            timestamp: None,
            edited_timestamp: None,
            pinned: false,
        }
    }

    /// Check if message has been edited
    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_timestamp.is_some()
    }
}

impl Identifiable for Message {
    type Key = Snowflake;

    const KIND: EntityKind = EntityKind::Message;

    fn key(&self) -> Snowflake {
        self.id
    }
}

impl GuildScoped for Message {
    fn guild_id(&self) -> Option<Snowflake> {
        self.guild_id
    }
}
