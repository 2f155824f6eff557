//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The folder path is not a normalized relative path.
    #[error("invalid folder path: {path:?}")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// A live record was written for a folder that does not exist.
    #[error("folder does not exist: {path:?}")]
    MissingFolder {
        /// The folder path.
        path: String,
    },

    /// Another process holds the metadata lock.
    #[error("metadata locked: another process has exclusive access")]
    Locked,
}
