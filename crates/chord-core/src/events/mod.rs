//! Gateway dispatch events
//!
//! Event names, the typed event enum and the table-driven decoder.

mod decoder;
mod event;
mod kind;

pub use decoder::{member_from_wire, message_from_wire, DecodeError, EventDecoder};
pub use event::{GatewayEvent, GuildCreate, MembersChunk, Patch, Ready};
pub use kind::EventKind;
