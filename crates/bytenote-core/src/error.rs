//! Error types for bytenote-core

use thiserror::Error;

/// Result type alias using bytenote-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bytenote-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local storage error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for local storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Failures of the local key-value storage.
///
/// A missing key is never an error; lookups return `Ok(None)` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Writing the value would exceed the storage quota
    #[error("Storage quota exceeded while writing {key} ({requested} bytes, {available} available)")]
    QuotaExceeded {
        key: String,
        requested: usize,
        available: usize,
    },

    /// A stored value exists but cannot be decoded
    #[error("Corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// The storage backend failed or is disabled
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub(crate) fn corrupt(key: &str, error: &serde_json::Error) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            reason: error.to_string(),
        }
    }
}

impl From<libsql::Error> for StorageError {
    fn from(error: libsql::Error) -> Self {
        Self::Unavailable(error.to_string())
    }
}
