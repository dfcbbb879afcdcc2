//! Error types for the trade-in price engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, PricingError>;

/// Errors raised while loading inputs or writing outputs.
///
/// Resolution itself is infallible; every variant here belongs to the
/// load/write edges of a batch run.
#[derive(Error, Debug)]
pub enum PricingError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Invalid condition key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Invalid reference entry '{key}': {reason}")]
    InvalidReference { key: String, reason: String },

    #[error("Reference price table is empty")]
    EmptyReference,

    #[error("Invalid pricing policy: {0}")]
    InvalidPolicy(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PricingError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into(), reason: reason.into() }
    }

    pub fn invalid_reference(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference { key: key.into(), reason: reason.into() }
    }

    pub fn invalid_policy(msg: impl Into<String>) -> Self {
        Self::InvalidPolicy(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
