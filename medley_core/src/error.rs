//! Error types for the medley_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medley_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad user input (empty required field, numeric value out of range)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation referenced a record that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error occurred (record store read/write)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The notification facility refused a schedule or cancel request
    #[error("Notifications unavailable: {0}")]
    NotificationUnavailable(String),
}

impl Error {
    /// Shorthand for a validation failure
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}
