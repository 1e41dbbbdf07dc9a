//! Gateway protocol definitions
//!
//! Op codes, frame format, close codes and payloads.

mod close_codes;
mod commands;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseAction, CloseCode};
pub use commands::GatewayCommand;
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload,
    RequestGuildMembersPayload, ResumePayload, Status, VoiceStateUpdatePayload,
};
