//! Typed handles to a single persistent file.
//!
//! Both handles load lazily on first access and keep the value in memory.
//! [`DefaultedFile`] falls back to `T::default()` when the file is missing
//! or broken; [`OptionalFile`] reports it as `None` and tries again on the
//! next access.

use crate::coordinator::FileCoordinator;
use crate::error::CoreResult;
use crate::progress::{self, ProgressSink};
use keepsake_codec::{JsonCodec, ObjectCodec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// A file whose value always exists, defaulting when it cannot be loaded.
///
/// # Example
///
/// ```rust
/// use keepsake_codec::{SerializationResolver, SerializerConfig};
/// use keepsake_core::{DefaultedFile, FileCoordinator};
/// use keepsake_storage::MemoryStorage;
/// use std::sync::Arc;
///
/// let serializer = SerializationResolver::new(SerializerConfig::new()).unwrap();
/// let files = Arc::new(FileCoordinator::new(Arc::new(MemoryStorage::new()), serializer));
///
/// let mut high_score = DefaultedFile::<u32>::new("score", files);
/// assert_eq!(*high_score.get(), 0);
/// *high_score.get_mut() = 1200;
/// high_score.save().unwrap();
/// ```
#[derive(Debug)]
pub struct DefaultedFile<T, C = JsonCodec> {
    filename: String,
    files: Arc<FileCoordinator<C>>,
    value: Option<T>,
}

impl<T, C> DefaultedFile<T, C>
where
    T: Serialize + DeserializeOwned + Default + Clone + Send + 'static,
    C: ObjectCodec + 'static,
{
    /// Creates a handle. Nothing is loaded until first access.
    pub fn new(filename: impl Into<String>, files: Arc<FileCoordinator<C>>) -> Self {
        Self {
            filename: filename.into(),
            files,
            value: None,
        }
    }

    /// Returns the logical filename.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the value, loading it on first access.
    pub fn get(&mut self) -> &T {
        self.get_mut()
    }

    /// Returns the value mutably, loading it on first access.
    pub fn get_mut(&mut self) -> &mut T {
        if self.value.is_none() {
            let loaded = self.files.load::<T>(&self.filename).into_value();
            self.value = Some(loaded.unwrap_or_default());
        }
        self.value.get_or_insert_with(T::default)
    }

    /// Replaces the in-memory value without saving.
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    /// Loads the value if it is not in memory yet.
    pub async fn load_async(&mut self, progress: Option<&dyn ProgressSink>) -> &T {
        if self.value.is_none() {
            let loaded = self
                .files
                .load_async::<T>(&self.filename, progress)
                .await
                .into_value();
            self.value = Some(loaded.unwrap_or_default());
        } else {
            progress::report(progress, 1.0);
        }
        self.value.get_or_insert_with(T::default)
    }

    /// Writes the in-memory value. Does nothing if it was never loaded or set.
    ///
    /// Waits for earlier writes like [`FileCoordinator::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> CoreResult<()> {
        if let Some(value) = &self.value {
            self.files.save(&self.filename, value)?;
        }
        Ok(())
    }

    /// Writes a snapshot of the in-memory value in the coordinator's queue.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save_async(&self, progress: Option<&dyn ProgressSink>) -> CoreResult<()> {
        match &self.value {
            Some(value) => {
                self.files
                    .save_async(&self.filename, value.clone(), progress)
                    .await?;
            }
            None => progress::report(progress, 1.0),
        }
        Ok(())
    }
}

/// A file whose value may be absent.
#[derive(Debug)]
pub struct OptionalFile<T, C = JsonCodec> {
    filename: String,
    files: Arc<FileCoordinator<C>>,
    value: Option<T>,
}

impl<T, C> OptionalFile<T, C>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
    C: ObjectCodec + 'static,
{
    /// Creates a handle. Nothing is loaded until first access.
    pub fn new(filename: impl Into<String>, files: Arc<FileCoordinator<C>>) -> Self {
        Self {
            filename: filename.into(),
            files,
            value: None,
        }
    }

    /// Returns the logical filename.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the value, trying to load it while absent.
    pub fn get(&mut self) -> Option<&T> {
        if self.value.is_none() {
            self.value = self.files.load::<T>(&self.filename).into_value();
        }
        self.value.as_ref()
    }

    /// Returns the value mutably, trying to load it while absent.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.get();
        self.value.as_mut()
    }

    /// Replaces the in-memory value without saving.
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    /// Tries to load the value while absent.
    pub async fn load_async(&mut self, progress: Option<&dyn ProgressSink>) -> Option<&T> {
        if self.value.is_none() {
            let loaded = self
                .files
                .load_async::<T>(&self.filename, progress)
                .await
                .into_value();
            self.value = loaded;
        } else {
            progress::report(progress, 1.0);
        }
        self.value.as_ref()
    }

    /// Writes the in-memory value. Does nothing while absent.
    ///
    /// Waits for earlier writes like [`FileCoordinator::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> CoreResult<()> {
        if let Some(value) = &self.value {
            self.files.save(&self.filename, value)?;
        }
        Ok(())
    }

    /// Writes a snapshot of the in-memory value in the coordinator's queue.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save_async(&self, progress: Option<&dyn ProgressSink>) -> CoreResult<()> {
        match &self.value {
            Some(value) => {
                self.files
                    .save_async(&self.filename, value.clone(), progress)
                    .await?;
            }
            None => progress::report(progress, 1.0),
        }
        Ok(())
    }
}
