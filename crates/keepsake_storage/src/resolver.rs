//! Storage resolver trait definition.

use crate::error::StorageResult;
use crate::load_result::LoadResult;
use async_trait::async_trait;

/// "Bytes on a medium" for keepsake.
///
/// Resolvers are **opaque byte stores** keyed by logical filename. They do not
/// interpret the bytes; serialization, compression and encryption happen
/// above this layer.
///
/// # Invariants
///
/// - `load_bytes` reports absence as [`LoadResult::NotFound`] and every other
///   failure as [`LoadResult::Error`]; it never panics on I/O failure
/// - `save_bytes` replaces the whole file; a reader never observes a partial write
/// - Resolvers must be `Send + Sync` and guard their own handles so reads
///   cannot interleave with writes to the same medium
///
/// # Implementors
///
/// - [`super::FileStorage`] - Files under a base directory
/// - [`super::PrefsStorage`] - Base64 strings in a preference store
/// - [`super::MemoryStorage`] - Ephemeral, instrumented store for tests
#[async_trait]
pub trait StorageResolver: Send + Sync {
    /// Returns true if any of the named logical files exists.
    fn any_exist(&self, filenames: &[&str]) -> bool;

    /// Loads the full contents of a logical file.
    fn load_bytes(&self, filename: &str) -> LoadResult<Vec<u8>>;

    /// Replaces the contents of a logical file.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the write.
    fn save_bytes(&self, filename: &str, data: &[u8]) -> StorageResult<()>;

    /// Removes a logical file. Removing a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the removal.
    fn delete(&self, filename: &str) -> StorageResult<()>;

    /// Asynchronous [`load_bytes`](Self::load_bytes).
    ///
    /// The default runs the synchronous version inline, which suits media
    /// that never block.
    async fn load_bytes_async(&self, filename: &str) -> LoadResult<Vec<u8>> {
        self.load_bytes(filename)
    }

    /// Asynchronous [`save_bytes`](Self::save_bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the write.
    async fn save_bytes_async(&self, filename: &str, data: &[u8]) -> StorageResult<()> {
        self.save_bytes(filename, data)
    }
}
