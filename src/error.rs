//! Error types for ortograbot.

use std::time::Duration;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Classification error: {0}")]
    Classification(#[from] ClassificationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// History store errors.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Search/post transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{operation} request failed: {reason}")]
    RequestFailed { operation: String, reason: String },

    #[error("{operation} rate limited, retry after {retry_after:?}")]
    RateLimited {
        operation: String,
        retry_after: Option<Duration>,
    },

    #[error("Authentication failed for {operation}")]
    AuthFailed { operation: String },

    #[error("Invalid response from {operation}: {reason}")]
    InvalidResponse { operation: String, reason: String },
}

/// Language classifier errors. Callers treat these as a non-match.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("Could not determine language of text")]
    Undetermined,

    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
