//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a record.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a record.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// Invalid UTF-8 in record bytes.
    #[error("invalid UTF-8 in record")]
    InvalidUtf8,

    /// An Entries line does not follow the `/name/rev/ts/opts/tag` layout.
    #[error("malformed entry line {line:?}: {message}")]
    MalformedEntry {
        /// The offending line.
        line: String,
        /// Description of the problem.
        message: String,
    },

    /// A required field is absent from a folder binding.
    #[error("missing field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A resource name cannot be written to an Entries line.
    #[error("invalid resource name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A record field cannot be written to an Entries line.
    #[error("invalid {field} {value:?}")]
    InvalidField {
        /// Which field was rejected.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            value: value.into(),
        }
    }

    /// Create a malformed entry error.
    pub fn malformed_entry(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedEntry {
            line: line.into(),
            message: message.into(),
        }
    }
}
