//! Error types for CVSync core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in CVSync core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Persistence provider error.
    #[error("storage error: {0}")]
    Storage(#[from] cvsync_storage::StorageError),

    /// Record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] cvsync_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Sync metadata expected to be cached is absent.
    ///
    /// This is an internal invariant violation and is never retried.
    #[error("sync metadata missing for {path}")]
    MetadataMissing {
        /// The resource whose metadata was expected.
        path: String,
    },

    /// A path is not a normalized relative path.
    #[error("invalid resource path: {path:?}")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// A resource required by the operation does not exist.
    #[error("resource not found: {path}")]
    ResourceNotFound {
        /// The missing resource.
        path: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// A single record could not be persisted.
    #[error("failed to {operation} metadata of {path}: {source}")]
    Persistence {
        /// Folder whose record failed.
        path: String,
        /// What was attempted (`write` or `delete`).
        operation: &'static str,
        /// The provider error.
        #[source]
        source: cvsync_storage::StorageError,
    },

    /// Several independent failures from one batch.
    #[error("{} errors occurred, first: {}", .errors.len(), first_message(.errors))]
    Multiple {
        /// Every failure, in the order it happened.
        errors: Vec<CoreError>,
    },

    /// Classification of a resource failed.
    #[error("failed to classify {path}: {source}")]
    ClassificationFailed {
        /// The resource being classified.
        path: String,
        /// The underlying failure.
        #[source]
        source: Box<CoreError>,
    },

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Creates a metadata missing error.
    pub fn metadata_missing(path: impl Into<String>) -> Self {
        Self::MetadataMissing { path: path.into() }
    }

    /// Creates a resource not found error.
    pub fn resource_not_found(path: impl Into<String>) -> Self {
        Self::ResourceNotFound { path: path.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a classification failed error.
    ///
    /// Cancellation is passed through unchanged.
    pub fn classification_failed(path: impl Into<String>, source: CoreError) -> Self {
        match source {
            CoreError::Cancelled => CoreError::Cancelled,
            source => Self::ClassificationFailed {
                path: path.into(),
                source: Box::new(source),
            },
        }
    }

    /// Merges a batch of failures into one result.
    ///
    /// No failure is `Ok`, a single failure is returned as is, and more
    /// than one become [`CoreError::Multiple`].
    pub fn merge(mut errors: Vec<CoreError>) -> CoreResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple { errors }),
        }
    }

    /// Returns true if this error is, or only contains, cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Multiple { errors } => errors.iter().all(Self::is_cancelled),
            _ => false,
        }
    }
}

fn first_message(errors: &[CoreError]) -> String {
    errors.first().map(ToString::to_string).unwrap_or_default()
}
