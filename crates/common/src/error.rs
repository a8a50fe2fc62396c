//! Error types shared across the smokefleet crates

use thiserror::Error;

/// Result type alias using the shared smokefleet Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the shared fleet, session and config layers
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("{prefix}_USERNAME and {prefix}_PASSWORD must be set")]
    MissingCredentials { prefix: String },

    #[error("Invalid URL for {service}: {url}")]
    InvalidUrl { service: String, url: String },

    #[error("Session snapshot error: {0}")]
    Snapshot(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
