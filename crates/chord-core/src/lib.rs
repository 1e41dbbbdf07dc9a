//! # chord-core
//!
//! Core types shared by every chord crate: snowflake ids, gateway intents,
//! the cache models and the typed gateway events.
//! This crate has no runtime or network dependencies.

pub mod entities;
pub mod events;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Channel, ChannelKind, EntityKind, Guild, GuildScoped, Identifiable, Member, MemberKey,
    Message, Role, UnavailableGuild, User,
};
pub use events::{
    member_from_wire, message_from_wire, DecodeError, EventDecoder, EventKind, GatewayEvent, Patch,
};
pub use value_objects::{GatewayIntents, Snowflake, SnowflakeParseError, Version, VersionClock};
