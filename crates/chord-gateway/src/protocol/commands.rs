//! Outbound commands users may send over a shard

use super::{
    GatewayMessage, PresenceUpdatePayload, RequestGuildMembersPayload, VoiceStateUpdatePayload,
};
use chord_core::Snowflake;

/// A rate-limited gateway command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCommand {
    PresenceUpdate(PresenceUpdatePayload),
    RequestGuildMembers(RequestGuildMembersPayload),
    VoiceStateUpdate(VoiceStateUpdatePayload),
}

impl GatewayCommand {
    /// Guild the command targets, used to pick the shard
    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            Self::PresenceUpdate(_) => None,
            Self::RequestGuildMembers(payload) => Some(payload.guild_id),
            Self::VoiceStateUpdate(payload) => Some(payload.guild_id),
        }
    }

    pub fn to_message(&self) -> GatewayMessage {
        match self {
            Self::PresenceUpdate(payload) => GatewayMessage::presence_update(payload),
            Self::RequestGuildMembers(payload) => GatewayMessage::request_guild_members(payload),
            Self::VoiceStateUpdate(payload) => GatewayMessage::voice_state_update(payload),
        }
    }
}
