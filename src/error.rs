//! Error types for the tiered cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tiered cache
#[derive(Error, Debug)]
pub enum Error {
    /// Caller supplied an argument the cache cannot honour
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Value could not be encoded or decoded
    #[error("Serialization with {format} failed: {reason}")]
    Serialization { format: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend operation failed
    #[error("Backend {backend} failed: {reason}")]
    Backend { backend: String, reason: String },
}

impl Error {
    pub(crate) fn serialization(format: &str, reason: impl std::fmt::Display) -> Self {
        Error::Serialization {
            format: format.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn backend(backend: &str, reason: impl std::fmt::Display) -> Self {
        Error::Backend {
            backend: backend.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}
