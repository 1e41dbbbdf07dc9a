//! Client configuration structs
//!
//! Loads configuration from `CHORD_*` environment variables (and a `.env` file
//! when present), or builds defaults around a token.

use chord_core::GatewayIntents;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Clone)]
pub struct ClientConfig {
    /// Bot token, sent as `Bot <token>`
    pub token: String,
    pub shards: ShardCount,
    pub intents: GatewayIntents,
    /// Consecutive failed reconnects before a shard gives up
    pub max_reconnect_attempts: u32,
    pub gateway: GatewayConfig,
    pub rest: RestConfig,
    pub cache: CacheConfig,
}

/// How many shards to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShardCount {
    /// Ask the platform for its recommended count
    #[default]
    Auto,
    Fixed(u32),
}

impl FromStr for ShardCount {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            s.trim().parse().map(Self::Fixed)
        }
    }
}

impl fmt::Display for ShardCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(count) => write!(f, "{count}"),
        }
    }
}

/// Gateway connection settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway URL used when the platform does not supply one
    pub url: String,
    pub version: u8,
    /// Maximum wait for Hello after the transport opens
    pub handshake_timeout: Duration,
    /// Maximum time a single heartbeat send may take
    pub heartbeat_send_timeout: Duration,
    /// Concurrent identify slots, replaced by the platform value in auto mode
    pub max_concurrency: u32,
    /// How long an identify slot stays held after acquisition
    pub identify_spacing: Duration,
    /// Member count above which the platform omits offline members
    pub large_threshold: u8,
    /// Outbound commands allowed per `command_period`
    pub command_limit: u32,
    pub command_period: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

/// REST pipeline settings
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Retries for transport errors, timeouts and 502/503/504
    pub max_retries: u32,
    /// Replays of a single request after 429 responses
    pub max_rate_limit_retries: u32,
    /// Aggregate in-flight request cap
    pub global_concurrency: usize,
    /// Buckets unused for this long are pruned
    pub bucket_idle_timeout: Duration,
}

/// Entity cache settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Guilds above this member count do not keep their member list
    pub large_member_threshold: u64,
    pub cache_messages: bool,
}

// Default value functions
fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg".to_string()
}

fn default_gateway_version() -> u8 {
    10
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_heartbeat_send_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_concurrency() -> u32 {
    1
}

fn default_identify_spacing() -> Duration {
    Duration::from_secs(5)
}

fn default_large_threshold() -> u8 {
    50
}

fn default_command_limit() -> u32 {
    120
}

fn default_command_period() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_base() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_max() -> Duration {
    Duration::from_secs(60)
}

fn default_rest_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_user_agent() -> String {
    concat!("DiscordBot (https://github.com/chord-rs/chord, ", env!("CARGO_PKG_VERSION"), ")")
        .to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_rate_limit_retries() -> u32 {
    5
}

fn default_global_concurrency() -> usize {
    50
}

fn default_bucket_idle_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_large_member_threshold() -> u64 {
    10_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            version: default_gateway_version(),
            handshake_timeout: default_handshake_timeout(),
            heartbeat_send_timeout: default_heartbeat_send_timeout(),
            max_concurrency: default_max_concurrency(),
            identify_spacing: default_identify_spacing(),
            large_threshold: default_large_threshold(),
            command_limit: default_command_limit(),
            command_period: default_command_period(),
            backoff_base: default_backoff_base(),
            backoff_max: default_backoff_max(),
        }
    }
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: default_rest_base_url(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            global_concurrency: default_global_concurrency(),
            bucket_idle_timeout: default_bucket_idle_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            large_member_threshold: default_large_member_threshold(),
            cache_messages: true,
        }
    }
}

impl ClientConfig {
    /// Default configuration around a token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            shards: ShardCount::Auto,
            intents: GatewayIntents::default(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            gateway: GatewayConfig::default(),
            rest: RestConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `CHORD_TOKEN` is missing or a variable does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration through a variable lookup
    ///
    /// # Errors
    /// Returns an error if `CHORD_TOKEN` is missing or a variable does not parse
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let token = vars
            .get("CHORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingVar("CHORD_TOKEN"))?;

        let intents = match vars.get("CHORD_INTENTS") {
            Some(raw) => GatewayIntents::parse(&raw)
                .map_err(|_| ConfigError::InvalidValue("CHORD_INTENTS", raw))?,
            None => GatewayIntents::default(),
        };

        let config = Self {
            token,
            shards: vars.parse_or("CHORD_SHARDS", ShardCount::default)?,
            intents,
            max_reconnect_attempts: vars
                .parse_or("CHORD_MAX_RECONNECT_ATTEMPTS", default_max_reconnect_attempts)?,
            gateway: GatewayConfig {
                url: vars.get("CHORD_GATEWAY_URL").unwrap_or_else(default_gateway_url),
                version: default_gateway_version(),
                handshake_timeout: vars
                    .millis_or("CHORD_HANDSHAKE_TIMEOUT_MS", default_handshake_timeout)?,
                heartbeat_send_timeout: vars.millis_or(
                    "CHORD_HEARTBEAT_SEND_TIMEOUT_MS",
                    default_heartbeat_send_timeout,
                )?,
                max_concurrency: vars
                    .parse_or("CHORD_MAX_CONCURRENCY", default_max_concurrency)?,
                identify_spacing: vars
                    .millis_or("CHORD_IDENTIFY_SPACING_MS", default_identify_spacing)?,
                large_threshold: vars
                    .parse_or("CHORD_LARGE_THRESHOLD", default_large_threshold)?,
                command_limit: default_command_limit(),
                command_period: default_command_period(),
                backoff_base: vars.millis_or("CHORD_BACKOFF_BASE_MS", default_backoff_base)?,
                backoff_max: vars.millis_or("CHORD_BACKOFF_MAX_MS", default_backoff_max)?,
            },
            rest: RestConfig {
                base_url: vars.get("CHORD_REST_URL").unwrap_or_else(default_rest_base_url),
                user_agent: default_user_agent(),
                request_timeout: vars
                    .millis_or("CHORD_REQUEST_TIMEOUT_MS", default_request_timeout)?,
                max_retries: vars.parse_or("CHORD_MAX_RETRIES", default_max_retries)?,
                max_rate_limit_retries: vars.parse_or(
                    "CHORD_MAX_RATE_LIMIT_RETRIES",
                    default_max_rate_limit_retries,
                )?,
                global_concurrency: vars
                    .parse_or("CHORD_GLOBAL_CONCURRENCY", default_global_concurrency)?,
                bucket_idle_timeout: vars
                    .millis_or("CHORD_BUCKET_IDLE_TIMEOUT_MS", default_bucket_idle_timeout)?,
            },
            cache: CacheConfig {
                large_member_threshold: vars.parse_or(
                    "CHORD_LARGE_MEMBER_THRESHOLD",
                    default_large_member_threshold,
                )?,
                cache_messages: vars.parse_or("CHORD_CACHE_MESSAGES", || true)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot work
    ///
    /// # Errors
    /// Returns `InvalidValue` naming the first offending setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingVar("CHORD_TOKEN"));
        }
        if self.shards == ShardCount::Fixed(0) {
            return Err(ConfigError::InvalidValue("CHORD_SHARDS", "0".to_string()));
        }
        if self.gateway.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "CHORD_MAX_CONCURRENCY",
                "0".to_string(),
            ));
        }
        if self.rest.global_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "CHORD_GLOBAL_CONCURRENCY",
                "0".to_string(),
            ));
        }
        if self.gateway.backoff_base > self.gateway.backoff_max {
            return Err(ConfigError::InvalidValue(
                "CHORD_BACKOFF_BASE_MS",
                format!("{:?} exceeds backoff max", self.gateway.backoff_base),
            ));
        }
        Ok(())
    }

    /// The `Authorization` header value
    pub fn authorization(&self) -> String {
        format!("Bot {}", self.token)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("shards", &self.shards)
            .field("intents", &self.intents)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("gateway", &self.gateway)
            .field("rest", &self.rest)
            .field("cache", &self.cache)
            .finish()
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    fn parse_or<T, D>(&self, name: &'static str, default: D) -> Result<T, ConfigError>
    where
        T: FromStr,
        D: FnOnce() -> T,
    {
        match self.get(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(name, raw)),
            None => Ok(default()),
        }
    }

    fn millis_or<D>(&self, name: &'static str, default: D) -> Result<Duration, ConfigError>
    where
        D: FnOnce() -> Duration,
    {
        match self.get(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidValue(name, raw)),
            None => Ok(default()),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
