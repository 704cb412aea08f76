//! In-memory storage resolver for testing.

use crate::error::{StorageError, StorageResult};
use crate::load_result::LoadResult;
use crate::resolver::StorageResolver;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One physical write boundary observed by a [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEvent {
    /// A write to the named file began.
    Started(String),
    /// A write to the named file completed.
    Finished(String),
}

/// An in-memory storage resolver.
///
/// This resolver keeps all files in a map and is suitable for:
/// - Unit and integration tests
/// - Ephemeral sessions that don't need persistence
///
/// It is instrumented: it counts physical writes and loads, records the
/// start/finish order of writes, tracks the peak number of overlapping
/// writes, and can inject load or save failures.
///
/// # Example
///
/// ```rust
/// use keepsake_storage::{MemoryStorage, StorageResolver};
///
/// let storage = MemoryStorage::new();
/// storage.save_bytes("a", b"test data").unwrap();
/// assert_eq!(storage.write_count(), 1);
/// assert_eq!(storage.load_bytes("a").value().unwrap(), b"test data");
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
    events: Mutex<Vec<WriteEvent>>,
    writes: AtomicUsize,
    loads: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    failing_loads: AtomicUsize,
    failing_saves: AtomicUsize,
    write_delay: Mutex<Option<Duration>>,
}

impl MemoryStorage {
    /// Creates a new empty in-memory resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver with one pre-existing file.
    ///
    /// Useful for testing recovery scenarios. Seeding is not counted as a write.
    #[must_use]
    pub fn with_file(filename: &str, data: Vec<u8>) -> Self {
        let storage = Self::new();
        storage.files.write().insert(filename.to_owned(), data);
        storage
    }

    /// Makes every asynchronous save sleep for `delay` while "in flight".
    #[must_use]
    pub fn with_write_delay(self, delay: Duration) -> Self {
        *self.write_delay.lock() = Some(delay);
        self
    }

    /// Returns a copy of a stored file, bypassing the load counters.
    #[must_use]
    pub fn file(&self, filename: &str) -> Option<Vec<u8>> {
        self.files.read().get(filename).cloned()
    }

    /// Replaces a stored file directly, bypassing write instrumentation.
    pub fn put_file(&self, filename: &str, data: Vec<u8>) {
        self.files.write().insert(filename.to_owned(), data);
    }

    /// Removes a stored file directly, bypassing write instrumentation.
    pub fn remove_file(&self, filename: &str) {
        self.files.write().remove(filename);
    }

    /// Number of physical writes performed.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of loads that reached this resolver.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Highest number of writes that were in flight at the same time.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Write start/finish events in the order they happened.
    #[must_use]
    pub fn events(&self) -> Vec<WriteEvent> {
        self.events.lock().clone()
    }

    /// Makes the next `count` loads fail with an I/O error.
    pub fn fail_next_loads(&self, count: usize) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` saves fail with an I/O error.
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn begin_write(&self, filename: &str) -> StorageResult<()> {
        if Self::take_failure(&self.failing_saves) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected save failure",
            )));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.events
            .lock()
            .push(WriteEvent::Started(filename.to_owned()));
        Ok(())
    }

    fn end_write(&self, filename: &str, data: &[u8]) {
        self.files.write().insert(filename.to_owned(), data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.events
            .lock()
            .push(WriteEvent::Finished(filename.to_owned()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageResolver for MemoryStorage {
    fn any_exist(&self, filenames: &[&str]) -> bool {
        let files = self.files.read();
        filenames.iter().any(|name| files.contains_key(*name))
    }

    fn load_bytes(&self, filename: &str) -> LoadResult<Vec<u8>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_loads) {
            return LoadResult::error(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected load failure",
            )));
        }
        match self.files.read().get(filename) {
            Some(data) => LoadResult::Succeeded(data.clone()),
            None => LoadResult::not_found(),
        }
    }

    fn save_bytes(&self, filename: &str, data: &[u8]) -> StorageResult<()> {
        self.begin_write(filename)?;
        self.end_write(filename, data);
        Ok(())
    }

    fn delete(&self, filename: &str) -> StorageResult<()> {
        self.files.write().remove(filename);
        Ok(())
    }

    async fn save_bytes_async(&self, filename: &str, data: &[u8]) -> StorageResult<()> {
        self.begin_write(filename)?;
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.end_write(filename, data);
        Ok(())
    }
}
