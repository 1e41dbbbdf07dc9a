//! # chord-common
//!
//! Shared utilities including configuration, error handling, retry backoff, and telemetry.

pub mod config;
pub mod error;
pub mod retry;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{CacheConfig, ClientConfig, ConfigError, GatewayConfig, RestConfig, ShardCount};
pub use error::{ClientError, ClientResult};
pub use retry::Backoff;
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
