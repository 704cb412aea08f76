//! Error types for keepsake core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by saves.
///
/// Loads never fail with an error; they report through
/// [`LoadResult`](keepsake_storage::LoadResult) instead.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] keepsake_storage::StorageError),

    /// Serialization pipeline error.
    #[error("codec error: {0}")]
    Codec(#[from] keepsake_codec::CodecError),

    /// A background task panicked or was cancelled.
    #[error("background task failed: {message}")]
    Task {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a background task error.
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_codec::CodecError;
    use keepsake_storage::StorageError;

    #[test]
    fn conversions() {
        let err: CoreError = CodecError::InvalidUtf8.into();
        assert!(matches!(err, CoreError::Codec(_)));

        let err: CoreError = StorageError::preferences("locked").into();
        assert_eq!(
            err.to_string(),
            "storage error: preference store error: locked"
        );
    }

    #[test]
    fn task_display() {
        assert_eq!(
            CoreError::task("panicked").to_string(),
            "background task failed: panicked"
        );
    }
}
