//! Error types for configuration, persistence and pattern compilation

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised outside the aggregation engine
#[derive(Error, Debug)]
pub enum MetricsError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or conflicting configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Glob or regex failed to compile
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed TOML configuration
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed YAML configuration
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Atomic rename into place failed
    #[error("Failed to persist {}: {message}", path.display())]
    Persist { path: PathBuf, message: String },
}

impl MetricsError {
    /// Create a configuration error
    pub fn config<E: fmt::Display>(msg: E) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern<E: fmt::Display>(pattern: &str, err: E) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }

    /// Create a persistence error for the given target path
    pub fn persist<E: fmt::Display>(path: impl Into<PathBuf>, err: E) -> Self {
        Self::Persist {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Check if this error came from malformed file contents rather than I/O
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Serialization(_) | Self::Toml(_) | Self::Yaml(_))
    }
}

/// Result type for netmetrics operations
pub type Result<T> = std::result::Result<T, MetricsError>;
