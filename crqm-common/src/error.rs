//! Common error types for CRQM

use thiserror::Error;

/// Common result type for CRQM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across CRQM crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A provider was configured but its credential could not be resolved
    #[error("Missing credential for {provider}: set {env_var} or `api_key` in the config file")]
    MissingCredential {
        provider: String,
        env_var: String,
    },

    /// Invalid user input or override value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
