//! Tagged outcome of a load.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Shared, clonable diagnostic cause attached to a failed load.
pub type Cause = Arc<dyn Error + Send + Sync + 'static>;

/// The state of a [`LoadResult`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// The value was loaded.
    Succeeded,
    /// The medium confirmed the file is absent.
    NotFound,
    /// The medium could not be read. Transient; safe to retry.
    Error,
    /// Bytes were read but could not be turned into a value.
    FailedDeserialize,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::NotFound => "not found",
            Self::Error => "error",
            Self::FailedDeserialize => "failed to deserialize",
        };
        f.write_str(s)
    }
}

/// Outcome of loading a logical file.
///
/// A value is present iff the state is [`LoadState::Succeeded`]. Every other
/// variant may carry the underlying cause for diagnostics. Results are
/// created fresh per load and never mutated.
#[derive(Debug, Clone)]
pub enum LoadResult<T> {
    /// The value was loaded.
    Succeeded(T),
    /// The file does not exist on the medium.
    NotFound(Option<Cause>),
    /// The medium failed for a reason other than absence.
    Error(Option<Cause>),
    /// The bytes exist but neither decode strategy produced a value.
    FailedDeserialize(Option<Cause>),
}

impl<T> LoadResult<T> {
    /// A `NotFound` result without a cause.
    #[must_use]
    pub fn not_found() -> Self {
        Self::NotFound(None)
    }

    /// A `NotFound` result carrying the error that reported the absence.
    pub fn not_found_with<E>(cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::NotFound(Some(Arc::new(cause)))
    }

    /// An `Error` result carrying its cause.
    pub fn error<E>(cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::Error(Some(Arc::new(cause)))
    }

    /// A `FailedDeserialize` result carrying its cause.
    pub fn failed_deserialize<E>(cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::FailedDeserialize(Some(Arc::new(cause)))
    }

    /// Returns the state tag.
    #[must_use]
    pub fn state(&self) -> LoadState {
        match self {
            Self::Succeeded(_) => LoadState::Succeeded,
            Self::NotFound(_) => LoadState::NotFound,
            Self::Error(_) => LoadState::Error,
            Self::FailedDeserialize(_) => LoadState::FailedDeserialize,
        }
    }

    /// Returns true if a value was loaded.
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Returns true if the medium confirmed absence.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns the loaded value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    /// Consumes the result, returning the loaded value if any.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the diagnostic cause of a failed load.
    #[must_use]
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            Self::Succeeded(_) => None,
            Self::NotFound(cause) | Self::Error(cause) | Self::FailedDeserialize(cause) => {
                cause.as_ref()
            }
        }
    }

    /// Maps the loaded value, keeping failure states and causes intact.
    pub fn map<S>(self, f: impl FnOnce(T) -> S) -> LoadResult<S> {
        match self.into_success() {
            Ok(value) => LoadResult::Succeeded(f(value)),
            Err(failure) => failure,
        }
    }

    /// Splits into the loaded value or the failure re-typed for another payload.
    pub fn into_success<S>(self) -> Result<T, LoadResult<S>> {
        match self {
            Self::Succeeded(value) => Ok(value),
            Self::NotFound(cause) => Err(LoadResult::NotFound(cause)),
            Self::Error(cause) => Err(LoadResult::Error(cause)),
            Self::FailedDeserialize(cause) => Err(LoadResult::FailedDeserialize(cause)),
        }
    }
}
