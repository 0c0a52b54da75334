//! Error types for declaration loading and request dispatch.
//!
//! Dispatch has exactly one negative outcome that is not an error: no endpoint
//! or variant matched. That is reported as [`crate::dispatch::Dispatch::Unmatched`].
//! Everything here is a genuine failure.

use thiserror::Error;

/// Errors raised while loading or compiling declarations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid regular expression '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to compile script: {0}")]
    Script(String),

    #[error("invalid declaration at {location}: {message}")]
    InvalidDeclaration { location: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(location: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidDeclaration {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by data producers and interceptor stages while answering a
/// matched request. They are not recovered by the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("data producer failed: {0}")]
    Producer(String),

    #[error("interceptor failed: {0}")]
    Interceptor(String),

    #[error("script execution error: {0}")]
    Script(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
