//! # Store Error Types
//!
//! Error types for storage, configuration and the save worker.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  io::Error / serde_json / toml                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds context and categorization             │
//! │       │                                                                 │
//! │       ├──► open / config: returned to the caller                        │
//! │       │                                                                 │
//! │       └──► save path: logged, NEVER returned from a cart mutation       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use shopbase_core::CoreError;
use thiserror::Error;

/// Store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure in a storage adapter or config load.
    ///
    /// ## When This Occurs
    /// - Storage directory cannot be created
    /// - Disk full / permissions
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage key contains characters the adapter cannot map to a slot.
    #[error("Invalid storage key: '{0}'")]
    InvalidKey(String),

    /// No platform directory could be determined.
    #[error("Could not determine a storage directory: {0}")]
    NoStorageDir(String),

    /// Invalid configuration value.
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load or parse the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Save worker channel closed (worker stopped).
    #[error("Save worker is not running: {0}")]
    ChannelClosed(String),

    /// Background write task failed to complete.
    #[error("Storage task failed: {0}")]
    TaskFailed(String),

    /// Cart rule violation or record codec failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::ConfigLoadFailed(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::TaskFailed(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
