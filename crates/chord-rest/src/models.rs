//! Response bodies the client itself consumes

use serde::Deserialize;
use std::time::Duration;

/// `GET /gateway/bot`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GatewayBot {
    pub url: String,
    /// Recommended shard count
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

/// Identify budget for the token
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` resets
    pub reset_after: u64,
    /// Shards that may identify at the same time
    pub max_concurrency: u32,
}

impl SessionStartLimit {
    pub fn reset_after(&self) -> Duration {
        Duration::from_millis(self.reset_after)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_bot_body() {
        let bot: GatewayBot = serde_json::from_str(
            r#"{
                "url": "wss://gateway.discord.gg",
                "shards": 9,
                "session_start_limit": {
                    "total": 1000,
                    "remaining": 999,
                    "reset_after": 14400000,
                    "max_concurrency": 1
                }
            }"#,
        )
        .unwrap();

        assert_eq!(bot.shards, 9);
        assert_eq!(bot.session_start_limit.max_concurrency, 1);
        assert_eq!(bot.session_start_limit.reset_after(), Duration::from_secs(14_400));
        assert!(!bot.session_start_limit.is_exhausted());
    }
}
