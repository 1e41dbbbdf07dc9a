//! User model

use serde::{Deserialize, Serialize};

use super::{Identifiable, EntityKind};
use crate::value_objects::Snowflake;

/// User snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

fn default_discriminator() -> String {
    "0".to_string()
}

impl User {
    /// Create a user snapshot with required fields
    pub fn new(id: Snowflake, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            discriminator: default_discriminator(),
            global_name: None,
            avatar: None,
            bot: false,
        }
    }

    /// Get the user tag
    ///
    /// Accounts migrated to unique usernames have discriminator "0" and no tag suffix.
    pub fn tag(&self) -> String {
        if self.discriminator == "0" {
            self.username.clone()
        } else {
            format!("{}#{}", self.username, self.discriminator)
        }
    }

    /// Name to show in UIs: global display name, then username
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }
}

impl Identifiable for User {
    type Key = Snowflake;

    const KIND: EntityKind = EntityKind::User;

    fn key(&self) -> Snowflake {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_tag() {
        let mut user = User::new(Snowflake::new(1), "nelly");
        assert_eq!(user.tag(), "nelly");

        user.discriminator = "1337".to_string();
        assert_eq!(user.tag(), "nelly#1337");
    }

    #[test]
    fn test_user_from_payload() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "80351110224678912",
            "username": "Nelly",
            "discriminator": "1337",
            "avatar": "8342729096ea3675442027381ff50dfe",
            "verified": true
        }))
        .unwrap();

        assert_eq!(user.display_name(), "Nelly");
        assert!(!user.bot);
    }
}
