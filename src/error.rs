//! Error types for mail-verdict.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Collection error: {0}")]
    Collect(#[from] CollectError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pointer store / tracker persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Errors raised by a remote message source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Source temporarily unavailable (HTTP {status})")]
    Unavailable { status: u16 },

    #[error("Source request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication rejected by source: {0}")]
    Auth(String),

    #[error("Message not found: {0}")]
    NotFound(String),

    #[error("Invalid response from source: {0}")]
    InvalidResponse(String),
}

impl SourceError {
    /// Whether the failure is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Unavailable { .. } | Self::Timeout | Self::Network(_)
        )
    }

    /// Server-suggested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Malformed message content.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Undecodable {part} payload: {reason}")]
    Payload { part: String, reason: String },
}

/// Failures of a single collection pass. The marker is never advanced on error.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Listing failed: {0}")]
    Listing(#[from] SourceError),

    #[error("Marker store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Failures of a full pipeline cycle.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Collection failed: {0}")]
    Collect(#[from] CollectError),

    #[error("Store failed: {0}")]
    Store(#[from] StoreError),

    #[error("Entity source failed: {0}")]
    Entities(String),

    #[error("Outcome sink failed: {0}")]
    Sink(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
