//! The file coordinator: typed saves and loads over one storage resolver.

use crate::config::CoordinatorConfig;
use crate::error::{CoreError, CoreResult};
use crate::progress::{self, ProgressSink};
use crate::queue::{Ticket, WriteQueue};
use crate::shutdown::ShutdownVeto;
use keepsake_codec::{JsonCodec, ObjectCodec, SerializationResolver};
use keepsake_storage::{LoadResult, LoadState, StorageResolver};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Saves and loads typed values through one storage resolver and one
/// serialization resolver.
///
/// ## Cache
///
/// The last known bytes of every file are kept per filename. Saves write
/// through; loads fill on miss. Only `Succeeded` and `NotFound` results are
/// remembered: an I/O error may be transient, and a value that failed to
/// decode is decoded again on the next load so a repaired file is picked up.
///
/// ## Write ordering
///
/// Saves and deletes on one coordinator reach the storage medium one at a
/// time, in the order they were issued, whatever their filenames and
/// whether they are synchronous or not. Each asynchronous save takes its
/// turn when [`save_async`](Self::save_async) is called, not when the
/// returned future is first polled. Serialization runs ahead of the turn.
///
/// A save whose bytes equal the cached bytes of the file skips the physical
/// write and still returns the bytes.
///
/// Every physical write holds a [`VetoGuard`](crate::VetoGuard) from the
/// coordinator's [`ShutdownVeto`]. An asynchronous write runs in its own
/// task: once started it finishes, and keeps its turn and its guard, even
/// if the future returned by `save_async` is dropped.
///
/// # Example
///
/// ```rust
/// use keepsake_codec::{SerializationResolver, SerializerConfig};
/// use keepsake_core::FileCoordinator;
/// use keepsake_storage::MemoryStorage;
/// use std::sync::Arc;
///
/// let storage = Arc::new(MemoryStorage::new());
/// let serializer = SerializationResolver::new(SerializerConfig::compressed(true)).unwrap();
/// let files = FileCoordinator::new(storage.clone(), serializer);
///
/// files.save("volume", &0.8_f32).unwrap();
/// assert_eq!(files.load::<f32>("volume").into_value(), Some(0.8));
/// assert_eq!(storage.load_count(), 0);
/// ```
pub struct FileCoordinator<C = JsonCodec> {
    storage: Arc<dyn StorageResolver>,
    serializer: Arc<SerializationResolver<C>>,
    config: CoordinatorConfig,
    cache: Arc<Mutex<HashMap<String, LoadResult<Vec<u8>>>>>,
    queue: Arc<WriteQueue>,
    veto: ShutdownVeto,
}

impl<C> fmt::Debug for FileCoordinator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCoordinator")
            .field("config", &self.config)
            .field("cached_files", &self.cache.lock().len())
            .field("queue", &self.queue)
            .field("veto", &self.veto)
            .finish_non_exhaustive()
    }
}

impl<C: ObjectCodec + 'static> FileCoordinator<C> {
    /// Creates a coordinator with the default configuration.
    pub fn new(storage: Arc<dyn StorageResolver>, serializer: SerializationResolver<C>) -> Self {
        Self {
            storage,
            serializer: Arc::new(serializer),
            config: CoordinatorConfig::default(),
            cache: Arc::new(Mutex::new(HashMap::new())),
            queue: Arc::new(WriteQueue::default()),
            veto: ShutdownVeto::new(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers writes with a shared veto instead of a private one.
    #[must_use]
    pub fn with_veto(mut self, veto: ShutdownVeto) -> Self {
        self.veto = veto;
        self
    }

    /// Returns the storage resolver.
    pub fn storage(&self) -> &Arc<dyn StorageResolver> {
        &self.storage
    }

    /// Returns the serialization resolver.
    pub fn serializer(&self) -> &SerializationResolver<C> {
        &self.serializer
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns the veto writes are registered with.
    pub fn veto(&self) -> &ShutdownVeto {
        &self.veto
    }

    /// Serializes and writes `value`, returning the bytes written.
    ///
    /// Blocks until every earlier write on this coordinator has finished.
    /// From async code, use [`save_async`](Self::save_async) or call this
    /// through `spawn_blocking`: blocking the only thread of a
    /// current-thread runtime while an asynchronous save is pending never
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save<T: Serialize + ?Sized>(&self, filename: &str, value: &T) -> CoreResult<Vec<u8>> {
        let ticket = self.queue.issue();
        let bytes = self.serializer.serialize(value)?;
        ticket.wait_blocking();

        if self.is_redundant(filename, &bytes) {
            debug!(filename, "skipping unchanged write");
            return Ok(bytes);
        }

        {
            let _guard = self.veto.prevent();
            self.storage.save_bytes(filename, &bytes)?;
        }
        self.remember(filename, &bytes);
        Ok(bytes)
    }

    /// Serializes `value` on the blocking pool and writes it in turn.
    ///
    /// Reports 0.5 once serialized and 1.0 when done, whether or not the
    /// save succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_async<'a, T>(
        &'a self,
        filename: &'a str,
        value: T,
        progress: Option<&'a dyn ProgressSink>,
    ) -> impl Future<Output = CoreResult<Vec<u8>>> + 'a
    where
        T: Serialize + Send + 'static,
    {
        let ticket = self.queue.issue();
        async move {
            let result = self.save_in_turn(filename, value, ticket, progress).await;
            progress::report(progress, 1.0);
            result
        }
    }

    async fn save_in_turn<T>(
        &self,
        filename: &str,
        value: T,
        ticket: Ticket,
        progress: Option<&dyn ProgressSink>,
    ) -> CoreResult<Vec<u8>>
    where
        T: Serialize + Send + 'static,
    {
        let bytes = self.serialize_blocking(value).await?;
        progress::report(progress, 0.5);

        ticket.wait().await;
        if self.is_redundant(filename, &bytes) {
            debug!(filename, "skipping unchanged write");
            return Ok(bytes);
        }
        self.spawn_write(filename, bytes, ticket).await
    }

    /// Waits for every save issued so far to finish.
    pub async fn flush(&self) {
        self.queue.issue().wait().await;
    }

    /// Loads and decodes a file.
    pub fn load<T: DeserializeOwned>(&self, filename: &str) -> LoadResult<T> {
        let bytes = match self.cached(filename) {
            Some(hit) => hit,
            None => {
                let loaded = self.storage.load_bytes(filename);
                self.fill(filename, &loaded);
                loaded
            }
        };

        match bytes.into_success() {
            Ok(bytes) => self.decoded(filename, self.serializer.deserialize(&bytes)),
            Err(failure) => failure,
        }
    }

    /// Loads a file and decodes it on the blocking pool.
    ///
    /// Reports 0.5 once the bytes are read and 1.0 when done.
    pub async fn load_async<T>(
        &self,
        filename: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> LoadResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let result = self.load_async_inner(filename, progress).await;
        progress::report(progress, 1.0);
        result
    }

    async fn load_async_inner<T>(
        &self,
        filename: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> LoadResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let bytes = match self.cached(filename) {
            Some(hit) => hit,
            None => {
                let loaded = self.storage.load_bytes_async(filename).await;
                self.fill(filename, &loaded);
                loaded
            }
        };

        let bytes = match bytes.into_success() {
            Ok(bytes) => bytes,
            Err(failure) => return failure,
        };
        progress::report(progress, 0.5);

        let serializer = Arc::clone(&self.serializer);
        match tokio::task::spawn_blocking(move || serializer.deserialize::<T>(&bytes)).await {
            Ok(decoded) => self.decoded(filename, decoded),
            Err(e) => LoadResult::error(CoreError::task(e.to_string())),
        }
    }

    /// Returns true if any named file is cached as loaded or exists in
    /// storage.
    pub fn any_exist(&self, filenames: &[&str]) -> bool {
        if filenames.is_empty() {
            return false;
        }
        {
            let cache = self.cache.lock();
            let cached = filenames
                .iter()
                .any(|name| matches!(cache.get(*name), Some(LoadResult::Succeeded(_))));
            if cached {
                return true;
            }
        }
        self.storage.any_exist(filenames)
    }

    /// Makes the file read as missing for this coordinator without
    /// touching storage.
    pub fn pseudo_delete(&self, filename: &str) {
        self.cache
            .lock()
            .insert(filename.to_owned(), LoadResult::not_found());
    }

    /// Removes the file from storage and remembers it as missing.
    ///
    /// Takes its turn after earlier writes, blocking like [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the removal.
    pub fn delete(&self, filename: &str) -> CoreResult<()> {
        let ticket = self.queue.issue();
        ticket.wait_blocking();
        {
            let _guard = self.veto.prevent();
            self.storage.delete(filename)?;
        }
        if self.config.cache_enabled {
            self.pseudo_delete(filename);
        }
        Ok(())
    }

    async fn serialize_blocking<T>(&self, value: T) -> CoreResult<Vec<u8>>
    where
        T: Serialize + Send + 'static,
    {
        let serializer = Arc::clone(&self.serializer);
        tokio::task::spawn_blocking(move || serializer.serialize(&value))
            .await
            .map_err(|e| CoreError::task(e.to_string()))?
            .map_err(CoreError::from)
    }

    /// Writes in a separate task that owns the turn and the veto guard, so
    /// dropping the caller's future cannot cut the write short.
    async fn spawn_write(&self, filename: &str, bytes: Vec<u8>, ticket: Ticket) -> CoreResult<Vec<u8>> {
        let storage = Arc::clone(&self.storage);
        let cache = self.config.cache_enabled.then(|| Arc::clone(&self.cache));
        let guard = self.veto.prevent();
        let filename = filename.to_owned();

        let write = tokio::spawn(async move {
            let written = storage.save_bytes_async(&filename, &bytes).await;
            if written.is_ok() {
                if let Some(cache) = cache {
                    cache
                        .lock()
                        .insert(filename, LoadResult::Succeeded(bytes.clone()));
                }
            }
            drop(guard);
            drop(ticket);
            written?;
            Ok::<_, CoreError>(bytes)
        });

        write.await.map_err(|e| CoreError::task(e.to_string()))?
    }

    fn is_redundant(&self, filename: &str, bytes: &[u8]) -> bool {
        if !self.config.dedup_writes || !self.config.cache_enabled {
            return false;
        }
        matches!(
            self.cache.lock().get(filename),
            Some(LoadResult::Succeeded(cached)) if cached.as_slice() == bytes
        )
    }

    fn remember(&self, filename: &str, bytes: &[u8]) {
        if self.config.cache_enabled {
            self.cache
                .lock()
                .insert(filename.to_owned(), LoadResult::Succeeded(bytes.to_vec()));
        }
    }

    fn cached(&self, filename: &str) -> Option<LoadResult<Vec<u8>>> {
        if !self.config.cache_enabled {
            return None;
        }
        let hit = self.cache.lock().get(filename).cloned();
        if hit.is_some() {
            debug!(filename, "cache hit");
        }
        hit
    }

    fn fill(&self, filename: &str, loaded: &LoadResult<Vec<u8>>) {
        match loaded.state() {
            LoadState::Succeeded | LoadState::NotFound => {
                if self.config.cache_enabled {
                    self.cache.lock().insert(filename.to_owned(), loaded.clone());
                }
            }
            LoadState::Error => {
                error!(filename, cause = ?loaded.cause(), "failed to load file");
            }
            LoadState::FailedDeserialize => {}
        }
    }

    fn decoded<T>(
        &self,
        filename: &str,
        decoded: keepsake_codec::CodecResult<T>,
    ) -> LoadResult<T> {
        match decoded {
            Ok(value) => LoadResult::Succeeded(value),
            Err(e) => {
                warn!(filename, error = %e, "file is broken");
                LoadResult::failed_deserialize(e)
            }
        }
    }
}
