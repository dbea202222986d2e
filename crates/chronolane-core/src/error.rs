//! Core error types for chronolane-core.
//!
//! Errors are grouped the same way the library is: interval and mapping
//! validation, entity graph lookups, and configuration I/O. Cycles in the
//! component graph and constraints that cannot be resolved are *not* errors;
//! they are handled in place and only logged.

use std::path::PathBuf;
use thiserror::Error;

use crate::graph::EntityId;

/// Core error type for chronolane-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Entity graph errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Interval whose end precedes its start
    #[error("Invalid interval: end ({end}) must not be before start ({start})")]
    InvalidInterval { start: i64, end: i64 },

    /// Pixel scale that cannot be used for mapping
    #[error("Invalid pixel scale: {0} (must be finite and non-negative)")]
    InvalidScale(f64),
}

/// Entity graph errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Id does not name a live entity
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// Key lookup failed
    #[error("Unknown entity key: {0}")]
    UnknownKey(String),

    /// Two entities registered under the same key
    #[error("Duplicate entity key: {0}")]
    DuplicateKey(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
