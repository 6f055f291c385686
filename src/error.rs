//! Error types returned by the storage facade.

use crate::value::ValueKind;
use thiserror::Error;

/// Errors that can occur while operating on the cache.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The key is not present in the primary map.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The stored value has a different shape than the accessor expects.
    #[error("value at '{key}' is not a {expected}")]
    WrongType { key: String, expected: ValueKind },

    /// List index past the end.
    #[error("index {index} out of bounds for list '{key}' of length {len}")]
    OutOfBounds { key: String, index: usize, len: usize },

    /// The dict exists but does not contain the inner key.
    #[error("key '{dict_key}' not found in dict '{key}'")]
    DictKeyNotFound { key: String, dict_key: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("expiry sweeper is already running")]
    SweeperAlreadyRunning,

    #[error("expiry sweeper is not running")]
    SweeperNotRunning,

    /// The sweeper needs a Tokio runtime to spawn on.
    #[error("no Tokio runtime available to run the expiry sweeper")]
    NoRuntime,

    /// The sweeper task panicked or was cancelled before it could report back.
    #[error("expiry sweeper task failed: {0}")]
    SweeperTaskFailed(String),
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
