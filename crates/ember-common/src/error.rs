//! Error types for Project Ember.

use thiserror::Error;

/// Top-level error type for Ember operations.
#[derive(Debug, Error)]
pub enum EmberError {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// File watcher errors
    #[error("Watch error: {0}")]
    Watch(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Ember operations.
pub type EmberResult<T> = Result<T, EmberError>;
