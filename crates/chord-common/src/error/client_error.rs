//! Client error types
//!
//! One taxonomy for gateway, shard and REST failures. Policy code asks
//! [`ClientError::is_retryable`] and [`ClientError::is_fatal`] instead of
//! matching variants.

use std::time::Duration;

use crate::config::ConfigError;

/// Client-wide error type
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    // Gateway errors
    #[error("Gateway did not send Hello in time")]
    HandshakeTimeout,

    #[error("Session invalidated (resumable: {resumable})")]
    InvalidSession { resumable: bool },

    #[error("Heartbeat was not acknowledged, connection is zombied")]
    Zombied,

    #[error("Gateway closed with fatal code {code}")]
    FatalClose { code: u16 },

    // Rate limiting
    #[error("Rate limited (global: {global}), retry after {retry_after:?}")]
    RateLimited { global: bool, retry_after: Duration },

    // Recoverable I/O
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Operation cancelled")]
    Cancelled,

    // API rejection
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Get a stable error code for logs and metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HandshakeTimeout => "HANDSHAKE_TIMEOUT",
            Self::InvalidSession { .. } => "INVALID_SESSION",
            Self::Zombied => "ZOMBIED",
            Self::FatalClose { .. } => "FATAL_CLOSE",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Transient(_) => "TRANSIENT",
            Self::Cancelled => "CANCELLED",
            Self::Http { .. } => "HTTP",
            Self::Decode(_) => "DECODE",
            Self::Config(_) => "CONFIG",
        }
    }

    /// Whether the operation may succeed if tried again
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::HandshakeTimeout
                | Self::InvalidSession { .. }
                | Self::Zombied
                | Self::RateLimited { .. }
                | Self::Transient(_)
        )
    }

    /// Whether the failure must surface immediately without retry
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalClose { .. } | Self::Config(_))
    }

    // Helper constructors
    pub fn transient(err: impl std::fmt::Display) -> Self {
        Self::Transient(err.to_string())
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<chord_core::DecodeError> for ClientError {
    fn from(err: chord_core::DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
