//! Entity cache
//!
//! Per-kind stores fed by gateway dispatches and REST responses. Models refer
//! to each other by id; the relation helpers resolve those ids by lookup and
//! skip any that are not cached.

use chord_common::CacheConfig;
use chord_core::{
    Channel, GatewayEvent, Guild, Identifiable, Member, MemberKey, Message, Patch, Role,
    Snowflake, User, Version, VersionClock,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::store::{Store, WriteOutcome};

/// Models the cache holds, each mapped to its store
pub trait Cached: Identifiable {
    fn store(cache: &EntityCache) -> &Store<Self>;
}

macro_rules! impl_cached {
    ($($model:ty => $field:ident),* $(,)?) => {
        $(
            impl Cached for $model {
                fn store(cache: &EntityCache) -> &Store<Self> {
                    &cache.$field
                }
            }
        )*
    };
}

impl_cached! {
    Guild => guilds,
    Channel => channels,
    User => users,
    Member => members,
    Role => roles,
    Message => messages,
}

/// Snapshot counts per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub guilds: usize,
    pub channels: usize,
    pub users: usize,
    pub members: usize,
    pub roles: usize,
    pub messages: usize,
}

/// Keyed store of model snapshots
#[derive(Debug)]
pub struct EntityCache {
    config: CacheConfig,
    clock: Arc<VersionClock>,
    guilds: Store<Guild>,
    channels: Store<Channel>,
    users: Store<User>,
    members: Store<Member>,
    roles: Store<Role>,
    messages: Store<Message>,
    current_user: RwLock<Option<Snowflake>>,
}

impl EntityCache {
    /// Create a cache with its own version clock
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(VersionClock::new()))
    }

    /// Create a cache sharing a clock with the gateway and REST writers
    #[must_use]
    pub fn with_clock(config: CacheConfig, clock: Arc<VersionClock>) -> Self {
        Self {
            config,
            clock,
            guilds: Store::new(),
            channels: Store::new(),
            users: Store::new(),
            members: Store::new(),
            roles: Store::new(),
            messages: Store::new(),
            current_user: RwLock::new(None),
        }
    }

    /// The clock writers stamp versions from
    pub fn clock(&self) -> &Arc<VersionClock> {
        &self.clock
    }

    // === Generic operations ===

    /// Insert or replace a snapshot unless a newer one is held
    pub fn apply_snapshot<T: Cached>(&self, model: T, version: Version) -> WriteOutcome {
        T::store(self).apply_snapshot(model, version)
    }

    /// Merge present fields into a held snapshot
    pub fn apply_patch<T: Cached>(&self, key: T::Key, patch: &Patch, version: Version) -> WriteOutcome {
        T::store(self).apply_patch(key, patch, version)
    }

    /// Remove an entity
    pub fn evict<T: Cached>(&self, key: &T::Key) -> Option<Arc<T>> {
        T::store(self).evict(key)
    }

    /// Look up an entity
    pub fn resolve<T: Cached>(&self, key: &T::Key) -> Option<Arc<T>> {
        T::store(self).resolve(key)
    }

    /// The user the client is logged in as, once READY has been seen
    pub fn current_user(&self) -> Option<Arc<User>> {
        let id = (*self.current_user.read())?;
        self.users.resolve(&id)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            guilds: self.guilds.len(),
            channels: self.channels.len(),
            users: self.users.len(),
            members: self.members.len(),
            roles: self.roles.len(),
            messages: self.messages.len(),
        }
    }

    // === Relations ===

    pub fn guild_of_channel(&self, channel_id: Snowflake) -> Option<Arc<Guild>> {
        let guild_id = self.channels.resolve(&channel_id)?.guild_id?;
        self.guilds.resolve(&guild_id)
    }

    pub fn channels_of_guild(&self, guild_id: Snowflake) -> Vec<Arc<Channel>> {
        self.channels
            .filter(|channel| channel.guild_id == Some(guild_id))
    }

    pub fn members_of_guild(&self, guild_id: Snowflake) -> Vec<Arc<Member>> {
        self.members.filter(|member| member.guild_id == guild_id)
    }

    pub fn roles_of_guild(&self, guild_id: Snowflake) -> Vec<Arc<Role>> {
        self.roles.filter(|role| role.guild_id == Some(guild_id))
    }

    /// Roles of a member that are cached; unknown role ids are skipped
    pub fn roles_of_member(&self, key: MemberKey) -> Vec<Arc<Role>> {
        let Some(member) = self.members.resolve(&key) else {
            return Vec::new();
        };
        member
            .roles
            .iter()
            .filter_map(|role_id| self.roles.resolve(role_id))
            .collect()
    }

    pub fn user_of_member(&self, key: MemberKey) -> Option<Arc<User>> {
        let member = self.members.resolve(&key)?;
        self.users.resolve(&member.user_id)
    }

    pub fn author_of_message(&self, message_id: Snowflake) -> Option<Arc<User>> {
        let message = self.messages.resolve(&message_id)?;
        self.users.resolve(&message.author_id)
    }

    // === Dispatch routing ===

    /// Apply a decoded gateway event stamped with `version`
    pub fn apply_event(&self, event: &GatewayEvent, version: Version) {
        match event {
            GatewayEvent::Ready(ready) => {
                self.users.apply_snapshot(ready.user.clone(), version);
                *self.current_user.write() = Some(ready.user.id);
                self.clear_tombstones();
            }
            GatewayEvent::Resumed | GatewayEvent::Unknown { .. } => {}

            GatewayEvent::GuildCreate(create) => {
                let guild_id = create.guild.id;
                self.guilds.apply_snapshot(create.guild.clone(), version);
                for channel in &create.channels {
                    self.channels.apply_snapshot(channel.clone(), version);
                }
                for role in &create.roles {
                    self.roles.apply_snapshot(role.clone(), version);
                }
                for user in &create.users {
                    self.users.apply_snapshot(user.clone(), version);
                }
                self.store_members(guild_id, &create.members, version);
            }
            GatewayEvent::GuildUnavailable(guild) => {
                self.mark_unavailable(guild.id, version);
            }
            GatewayEvent::GuildUpdate { id, patch } => {
                self.guilds.apply_patch(*id, patch, version);
            }
            GatewayEvent::GuildDelete(guild) => {
                if guild.unavailable {
                    self.mark_unavailable(guild.id, version);
                } else {
                    self.delete_guild(guild.id, version);
                }
            }

            GatewayEvent::ChannelCreate(channel) | GatewayEvent::ChannelUpdate(channel) => {
                self.channels.apply_snapshot(channel.clone(), version);
            }
            GatewayEvent::ChannelDelete(channel) => {
                if self.channels.delete(channel.id, version).is_applied() {
                    self.messages
                        .delete_where(|m| m.channel_id == channel.id, version);
                }
            }

            GatewayEvent::RoleCreate { role, .. } | GatewayEvent::RoleUpdate { role, .. } => {
                self.roles.apply_snapshot(role.clone(), version);
            }
            GatewayEvent::RoleDelete { role_id, .. } => {
                self.roles.delete(*role_id, version);
            }

            GatewayEvent::MemberAdd { member, user } => {
                self.users.apply_snapshot(user.clone(), version);
                self.adjust_member_count(member.guild_id, 1, version);
                if !self.keeps_members(member.guild_id) {
                    return;
                }
                self.members.apply_snapshot(member.clone(), version);
            }
            GatewayEvent::MemberUpdate {
                guild_id,
                user,
                patch,
            } => {
                self.users.apply_snapshot(user.clone(), version);
                self.members
                    .apply_patch(MemberKey::new(*guild_id, user.id), patch, version);
            }
            GatewayEvent::MemberRemove { guild_id, user } => {
                self.members
                    .delete(MemberKey::new(*guild_id, user.id), version);
                self.adjust_member_count(*guild_id, -1, version);
            }
            GatewayEvent::MembersChunk(chunk) => {
                for user in &chunk.users {
                    self.users.apply_snapshot(user.clone(), version);
                }
                self.store_members(chunk.guild_id, &chunk.members, version);
            }

            GatewayEvent::MessageCreate { message, author } => {
                self.users.apply_snapshot(author.clone(), version);
                let last_message: Patch = json_patch(json!({ "last_message_id": message.id }));
                self.channels
                    .apply_patch(message.channel_id, &last_message, version);
                if self.config.cache_messages {
                    self.messages.apply_snapshot(message.clone(), version);
                }
            }
            GatewayEvent::MessageUpdate { id, patch, .. } => {
                self.messages.apply_patch(*id, patch, version);
            }
            GatewayEvent::MessageDelete { id, .. } => {
                self.messages.delete(*id, version);
            }

            GatewayEvent::UserUpdate(user) => {
                self.users.apply_snapshot(user.clone(), version);
            }
        }
    }

    /// Whether the member list of a guild is kept
    fn keeps_members(&self, guild_id: Snowflake) -> bool {
        self.guilds.resolve(&guild_id).map_or(true, |guild| {
            !guild.exceeds_member_threshold(self.config.large_member_threshold)
        })
    }

    fn store_members(&self, guild_id: Snowflake, members: &[Member], version: Version) {
        if !self.keeps_members(guild_id) {
            let evicted = self.members.evict_where(|m| m.guild_id == guild_id);
            tracing::debug!(
                guild_id = %guild_id,
                evicted,
                threshold = self.config.large_member_threshold,
                "Guild above member threshold, member list not cached"
            );
            return;
        }
        for member in members {
            self.members.apply_snapshot(member.clone(), version);
        }
    }

    fn adjust_member_count(&self, guild_id: Snowflake, delta: i64, version: Version) {
        self.guilds.modify(guild_id, version, |guild| {
            let mut guild = guild.clone();
            guild.member_count = guild
                .member_count
                .map(|count| count.saturating_add_signed(delta));
            guild
        });
    }

    fn mark_unavailable(&self, guild_id: Snowflake, version: Version) {
        let patch = json_patch(json!({ "unavailable": true }));
        self.guilds.apply_patch(guild_id, &patch, version);
    }

    fn delete_guild(&self, guild_id: Snowflake, version: Version) {
        if !self.guilds.delete(guild_id, version).is_applied() {
            return;
        }

        let channels = self.channels.delete_where(|c| c.guild_id == Some(guild_id), version);
        let roles = self.roles.delete_where(|r| r.guild_id == Some(guild_id), version);
        let members = self.members.delete_where(|m| m.guild_id == guild_id, version);
        let messages = self.messages.delete_where(|m| m.guild_id == Some(guild_id), version);

        tracing::debug!(
            guild_id = %guild_id,
            channels,
            roles,
            members,
            messages,
            "Guild removed from cache"
        );
    }

    fn clear_tombstones(&self) {
        self.guilds.clear_tombstones();
        self.channels.clear_tombstones();
        self.users.clear_tombstones();
        self.members.clear_tombstones();
        self.roles.clear_tombstones();
        self.messages.clear_tombstones();
    }
}

fn json_patch(value: Value) -> Patch {
    match value {
        Value::Object(map) => map,
        _ => Patch::new(),
    }
}
