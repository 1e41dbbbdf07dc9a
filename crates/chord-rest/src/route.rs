//! Route descriptors
//!
//! A route pairs an HTTP method with a path template and the concrete path.
//! The template plus the major parameter (channel, guild or webhook id) is what
//! the platform groups rate limits by, so it doubles as the provisional bucket
//! key until the first response names the real bucket.

use chord_core::{MemberKey, Snowflake};
use reqwest::Method;
use std::fmt;

/// One REST call target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    method: Method,
    template: &'static str,
    major: Option<Snowflake>,
    path: String,
}

impl Route {
    /// Build a route from its parts
    pub fn new(
        method: Method,
        template: &'static str,
        major: Option<Snowflake>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            method,
            template,
            major,
            path: path.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &'static str {
        self.template
    }

    pub fn major(&self) -> Option<Snowflake> {
        self.major
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `METHOD template`, the key bucket hashes are learned under
    pub fn bucket_route(&self) -> String {
        format!("{} {}", self.method, self.template)
    }

    /// Bucket key used before the platform has named the bucket
    pub fn provisional_key(&self) -> String {
        format!("{}:{}", self.bucket_route(), self.major_part())
    }

    /// Bucket key once the bucket hash is known
    pub fn bucket_key(&self, hash: &str) -> String {
        format!("{hash}:{}", self.major_part())
    }

    fn major_part(&self) -> String {
        self.major.map_or_else(|| "-".to_string(), |id| id.to_string())
    }

    // === Catalogue ===

    pub fn get_gateway_bot() -> Self {
        Self::new(Method::GET, "/gateway/bot", None, "/gateway/bot")
    }

    pub fn get_current_user() -> Self {
        Self::new(Method::GET, "/users/@me", None, "/users/@me")
    }

    pub fn get_user(user_id: Snowflake) -> Self {
        Self::new(
            Method::GET,
            "/users/{user_id}",
            None,
            format!("/users/{user_id}"),
        )
    }

    pub fn get_guild(guild_id: Snowflake) -> Self {
        Self::new(
            Method::GET,
            "/guilds/{guild_id}",
            Some(guild_id),
            format!("/guilds/{guild_id}"),
        )
    }

    pub fn get_guild_channels(guild_id: Snowflake) -> Self {
        Self::new(
            Method::GET,
            "/guilds/{guild_id}/channels",
            Some(guild_id),
            format!("/guilds/{guild_id}/channels"),
        )
    }

    pub fn get_guild_roles(guild_id: Snowflake) -> Self {
        Self::new(
            Method::GET,
            "/guilds/{guild_id}/roles",
            Some(guild_id),
            format!("/guilds/{guild_id}/roles"),
        )
    }

    pub fn get_guild_member(key: MemberKey) -> Self {
        Self::new(
            Method::GET,
            "/guilds/{guild_id}/members/{user_id}",
            Some(key.guild_id),
            format!("/guilds/{}/members/{}", key.guild_id, key.user_id),
        )
    }

    pub fn get_channel(channel_id: Snowflake) -> Self {
        Self::new(
            Method::GET,
            "/channels/{channel_id}",
            Some(channel_id),
            format!("/channels/{channel_id}"),
        )
    }

    pub fn get_message(channel_id: Snowflake, message_id: Snowflake) -> Self {
        Self::new(
            Method::GET,
            "/channels/{channel_id}/messages/{message_id}",
            Some(channel_id),
            format!("/channels/{channel_id}/messages/{message_id}"),
        )
    }

    pub fn create_message(channel_id: Snowflake) -> Self {
        Self::new(
            Method::POST,
            "/channels/{channel_id}/messages",
            Some(channel_id),
            format!("/channels/{channel_id}/messages"),
        )
    }

    pub fn edit_message(channel_id: Snowflake, message_id: Snowflake) -> Self {
        Self::new(
            Method::PATCH,
            "/channels/{channel_id}/messages/{message_id}",
            Some(channel_id),
            format!("/channels/{channel_id}/messages/{message_id}"),
        )
    }

    pub fn delete_message(channel_id: Snowflake, message_id: Snowflake) -> Self {
        Self::new(
            Method::DELETE,
            "/channels/{channel_id}/messages/{message_id}",
            Some(channel_id),
            format!("/channels/{channel_id}/messages/{message_id}"),
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_key_includes_major() {
        let route = Route::create_message(Snowflake::new(42));
        assert_eq!(route.provisional_key(), "POST /channels/{channel_id}/messages:42");
        assert_eq!(route.path(), "/channels/42/messages");
    }

    #[test]
    fn test_routes_without_major() {
        let route = Route::get_user(Snowflake::new(7));
        assert_eq!(route.provisional_key(), "GET /users/{user_id}:-");
        assert_eq!(route.major(), None);
    }

    #[test]
    fn test_bucket_key() {
        let route = Route::get_channel(Snowflake::new(9));
        assert_eq!(route.bucket_key("abcd"), "abcd:9");
        assert_eq!(route.bucket_route(), "GET /channels/{channel_id}");
    }

    #[test]
    fn test_same_template_different_methods() {
        let edit = Route::edit_message(Snowflake::new(1), Snowflake::new(2));
        let delete = Route::delete_message(Snowflake::new(1), Snowflake::new(2));
        assert_ne!(edit.provisional_key(), delete.provisional_key());
        assert_eq!(edit.path(), delete.path());
    }
}
