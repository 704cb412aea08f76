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

    /// The logical filename cannot be mapped onto the medium.
    #[error("invalid filename '{filename}': {reason}")]
    InvalidFilename {
        /// The rejected filename.
        filename: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A stored value could not be decoded back into bytes.
    #[error("stored value for '{key}' is not valid base64: {message}")]
    Encoding {
        /// The preference key holding the value.
        key: String,
        /// Decoder message.
        message: String,
    },

    /// The preference store failed to persist or load its contents.
    #[error("preference store error: {0}")]
    Preferences(String),

    /// A background task running the operation panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl StorageError {
    /// Creates an invalid filename error.
    pub fn invalid_filename(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilename {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    /// Creates a preference store error.
    pub fn preferences(message: impl Into<String>) -> Self {
        Self::Preferences(message.into())
    }

    /// Returns true if this error means the medium confirmed absence.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}
