//! Value objects

mod intents;
mod snowflake;
mod version;

pub use intents::GatewayIntents;
pub use snowflake::{Snowflake, SnowflakeParseError};
pub use version::{Version, VersionClock};
