//! Error types for remote tree reconciliation.

use cvsync_core::CoreError;
use thiserror::Error;

/// Result type for reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors that can occur while building a remote tree.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Local metadata could not be read or written.
    #[error("metadata error: {0}")]
    Core(#[source] CoreError),

    /// The server reported errors for the exchange.
    #[error("server error: {}", .errors.join("; "))]
    Server {
        /// Messages as reported by the server.
        errors: Vec<String>,
    },

    /// The connection to the server failed mid-exchange.
    ///
    /// [`DeltaSource`](crate::DeltaSource) implementations return this for
    /// I/O and protocol failures. Unlike [`ReconcileError::Server`] it is
    /// never tolerated after partial results.
    #[error("transport error: {0}")]
    Transport(String),

    /// A listener received a path that is not a normalized relative path.
    #[error("invalid path reported by server: {path:?}")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// The folder is not bound to a repository.
    #[error("{path} is not a CVS folder")]
    NotManaged {
        /// The folder.
        path: String,
    },

    /// Several independent failures from one pass.
    #[error("{} errors occurred", .errors.len())]
    Multiple {
        /// Every failure, in the order it happened.
        errors: Vec<ReconcileError>,
    },

    /// The build was cancelled.
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl From<CoreError> for ReconcileError {
    fn from(error: CoreError) -> Self {
        if error.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Core(error)
        }
    }
}

/// Server message for a tag filter that matched nothing.
const NO_SUCH_TAG: &str = "no such tag";

impl ReconcileError {
    /// Creates a server error from reported messages.
    pub fn server<I, M>(messages: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        Self::Server {
            errors: messages.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true for a server error made only of "no such tag" messages.
    ///
    /// CVS reports this for a tagged update of a folder whose files all
    /// live in subfolders.
    pub fn is_no_tag(&self) -> bool {
        match self {
            Self::Server { errors } => {
                !errors.is_empty()
                    && errors
                        .iter()
                        .all(|e| e.to_ascii_lowercase().contains(NO_SUCH_TAG))
            }
            _ => false,
        }
    }

    /// Returns true for a server-reported error.
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Returns true if this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Merges a batch of failures into one result.
    pub fn merge(mut errors: Vec<ReconcileError>) -> ReconcileResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple { errors }),
        }
    }
}
