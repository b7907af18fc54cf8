//! Error types for chatlens-core

use thiserror::Error;

/// Main error type for the chatlens-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Neither supported log layout matched the table catalog
    #[error("unsupported log schema: {0}")]
    SchemaUnsupported(String),

    /// Caller asked for a context mode that does not exist
    #[error("invalid context mode: {0}")]
    InvalidContextMode(String),

    /// Generator hit a provider quota signal
    #[error("generator rate limited: {0}")]
    RateLimited(String),

    /// Generator failed for any other reason
    #[error("generation failed: {0}")]
    Generation(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for the two generator failure kinds that trigger fallback.
    pub fn is_generator_failure(&self) -> bool {
        matches!(self, Error::RateLimited(_) | Error::Generation(_))
    }
}

/// Result type alias for chatlens-core
pub type Result<T> = std::result::Result<T, Error>;
