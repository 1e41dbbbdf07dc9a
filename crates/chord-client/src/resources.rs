//! REST helpers that keep the cache current
//!
//! Every fetch writes its result into the cache under the version stamped when
//! the request was submitted, then returns what the cache holds. If a newer
//! gateway dispatch landed while the request was in flight, the caller gets
//! that newer snapshot instead of the stale response.

use std::sync::Arc;

use chord_cache::{Cached, WriteOutcome};
use chord_common::ClientResult;
use chord_core::{
    member_from_wire, message_from_wire, Channel, Guild, Member, MemberKey, Message, Role,
    Snowflake, User, Version,
};
use chord_gateway::protocol::{PresenceUpdatePayload, RequestGuildMembersPayload};
use chord_gateway::GatewayCommand;
use chord_rest::{Route, Versioned};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::client::Client;

impl Client {
    // === Fetch ===

    #[instrument(skip(self))]
    pub async fn fetch_guild(&self, guild_id: Snowflake) -> ClientResult<Arc<Guild>> {
        self.fetch(Route::get_guild(guild_id)).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_channel(&self, channel_id: Snowflake) -> ClientResult<Arc<Channel>> {
        self.fetch(Route::get_channel(channel_id)).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_user(&self, user_id: Snowflake) -> ClientResult<Arc<User>> {
        self.fetch(Route::get_user(user_id)).await
    }

    /// The bot's own user
    pub async fn fetch_current_user(&self) -> ClientResult<Arc<User>> {
        self.fetch(Route::get_current_user()).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_member(&self, key: MemberKey) -> ClientResult<Arc<Member>> {
        let Versioned { value, version } = self
            .rest()
            .request::<Value>(Route::get_guild_member(key), None)
            .await?;
        let (member, user) = member_from_wire(key.guild_id, value)?;

        self.store(user, version);
        Ok(self.store(member, version))
    }

    #[instrument(skip(self))]
    pub async fn fetch_guild_channels(&self, guild_id: Snowflake) -> ClientResult<Vec<Arc<Channel>>> {
        let Versioned { value, version } = self
            .rest()
            .request::<Vec<Channel>>(Route::get_guild_channels(guild_id), None)
            .await?;

        Ok(value
            .into_iter()
            .map(|mut channel| {
                channel.guild_id.get_or_insert(guild_id);
                self.store(channel, version)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn fetch_guild_roles(&self, guild_id: Snowflake) -> ClientResult<Vec<Arc<Role>>> {
        let Versioned { value, version } = self
            .rest()
            .request::<Vec<Role>>(Route::get_guild_roles(guild_id), None)
            .await?;

        Ok(value
            .into_iter()
            .map(|mut role| {
                role.guild_id = Some(guild_id);
                self.store(role, version)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn fetch_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> ClientResult<Arc<Message>> {
        let Versioned { value, version } = self
            .rest()
            .request::<Value>(Route::get_message(channel_id, message_id), None)
            .await?;
        Ok(self.store_message(value, version)?)
    }

    /// Post a text message
    #[instrument(skip(self, content))]
    pub async fn create_message(
        &self,
        channel_id: Snowflake,
        content: impl Into<String>,
    ) -> ClientResult<Arc<Message>> {
        let body = json!({ "content": content.into() });
        let Versioned { value, version } = self
            .rest()
            .request::<Value>(Route::create_message(channel_id), Some(body))
            .await?;
        Ok(self.store_message(value, version)?)
    }

    // === Gateway commands ===

    /// Send a command on the shard that owns its guild
    pub async fn send_command(&self, command: GatewayCommand) -> ClientResult<()> {
        self.gateway().send(command).await
    }

    /// Update the presence on every shard
    pub async fn update_presence(&self, presence: PresenceUpdatePayload) -> ClientResult<()> {
        for shard in self.gateway().shards() {
            shard
                .send(GatewayCommand::PresenceUpdate(presence.clone()))
                .await?;
        }
        Ok(())
    }

    /// Ask for member chunks; they arrive as `GUILD_MEMBERS_CHUNK` dispatches
    pub async fn request_guild_members(&self, request: RequestGuildMembersPayload) -> ClientResult<()> {
        self.send_command(GatewayCommand::RequestGuildMembers(request))
            .await
    }

    // === Helpers ===

    async fn fetch<T: Cached>(&self, route: Route) -> ClientResult<Arc<T>> {
        let Versioned { value, version } = self.rest().request::<T>(route, None).await?;
        Ok(self.store(value, version))
    }

    fn store_message(&self, value: Value, version: Version) -> Result<Arc<Message>, serde_json::Error> {
        let (message, author) = message_from_wire(value)?;
        self.store(author, version);
        if !self.config().cache.cache_messages {
            return Ok(Arc::new(message));
        }
        Ok(self.store(message, version))
    }

    /// Write a REST result and return the cache's view of it
    fn store<T: Cached>(&self, model: T, version: Version) -> Arc<T> {
        let key = model.key();
        let outcome = self.cache().apply_snapshot(model.clone(), version);
        if outcome == WriteOutcome::Stale {
            debug!(kind = %T::KIND, key = %key, version = %version, "Newer snapshot already cached");
        }
        // uncached kinds (or evicted members) still return the fetched value
        self.cache()
            .resolve::<T>(&key)
            .unwrap_or_else(|| Arc::new(model))
    }
}
