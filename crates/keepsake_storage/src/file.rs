//! File-based storage resolver for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::load_result::LoadResult;
use crate::resolver::StorageResolver;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A file-based storage resolver.
///
/// Logical filenames are resolved against a base directory. Nested names
/// (`"slots/1.sav"`) are allowed; absolute paths and `..` components are
/// rejected so a resolver never writes outside its base directory.
///
/// # Durability
///
/// With atomic writes enabled (the default), `save_bytes` writes a sibling
/// temporary file, syncs it and renames it over the target. A process killed
/// mid-write leaves the previous contents intact.
///
/// # Thread Safety
///
/// Every clone of a `FileStorage` shares one read/write gate: loads run
/// concurrently with each other, saves exclude everything else.
///
/// # Example
///
/// ```no_run
/// use keepsake_storage::{FileStorage, StorageResolver};
///
/// let storage = FileStorage::new("saves");
/// storage.save_bytes("slot1.sav", b"payload").unwrap();
/// let loaded = storage.load_bytes("slot1.sav");
/// assert_eq!(loaded.value().unwrap(), b"payload");
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    inner: Arc<FileStorageInner>,
}

#[derive(Debug)]
struct FileStorageInner {
    root: PathBuf,
    atomic_writes: bool,
    gate: RwLock<()>,
}

impl FileStorage {
    /// Creates a resolver rooted at `root`.
    ///
    /// The directory is created lazily on the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(FileStorageInner {
                root: root.into(),
                atomic_writes: true,
                gate: RwLock::new(()),
            }),
        }
    }

    /// Creates a resolver rooted at `root/subdirectory`.
    pub fn with_subdirectory(root: impl AsRef<Path>, subdirectory: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(subdirectory))
    }

    /// Sets whether saves go through a temporary file and rename.
    #[must_use]
    pub fn atomic_writes(self, value: bool) -> Self {
        Self {
            inner: Arc::new(FileStorageInner {
                root: self.inner.root.clone(),
                atomic_writes: value,
                gate: RwLock::new(()),
            }),
        }
    }

    /// Returns the base directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Resolves a logical filename to its full path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidFilename`] for empty, absolute or
    /// parent-relative names.
    pub fn path_for(&self, filename: &str) -> StorageResult<PathBuf> {
        self.inner.path_for(filename)
    }
}

impl FileStorageInner {
    fn path_for(&self, filename: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(filename);
        if filename.is_empty() {
            return Err(StorageError::invalid_filename(filename, "empty filename"));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(StorageError::invalid_filename(
                        filename,
                        "must be relative to the base directory",
                    ))
                }
            }
        }
        Ok(self.root.join(relative))
    }

    fn any_exist(&self, filenames: &[&str]) -> bool {
        let _guard = self.gate.read();
        filenames.iter().any(|name| {
            self.path_for(name)
                .map(|path| path.is_file())
                .unwrap_or(false)
        })
    }

    fn load(&self, filename: &str) -> LoadResult<Vec<u8>> {
        let path = match self.path_for(filename) {
            Ok(path) => path,
            Err(e) => return LoadResult::error(e),
        };

        let _guard = self.gate.read();
        match fs::read(&path) {
            Ok(bytes) => LoadResult::Succeeded(bytes),
            // A missing directory surfaces as NotFound too.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                LoadResult::not_found_with(StorageError::Io(e))
            }
            Err(e) => LoadResult::error(StorageError::Io(e)),
        }
    }

    fn save(&self, filename: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.path_for(filename)?;

        let _guard = self.gate.write();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if !self.atomic_writes {
            fs::write(&path, data)?;
            return Ok(());
        }

        let tmp = temp_path_for(&path);
        let written = write_synced(&tmp, data).and_then(|()| fs::rename(&tmp, &path));
        if let Err(e) = written {
            // Best effort; the write error is what gets returned.
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(path = %path.display(), len = data.len(), "wrote file");
        Ok(())
    }

    fn delete(&self, filename: &str) -> StorageResult<()> {
        let path = self.path_for(filename)?;

        let _guard = self.gate.write();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

#[async_trait]
impl StorageResolver for FileStorage {
    fn any_exist(&self, filenames: &[&str]) -> bool {
        self.inner.any_exist(filenames)
    }

    fn load_bytes(&self, filename: &str) -> LoadResult<Vec<u8>> {
        self.inner.load(filename)
    }

    fn save_bytes(&self, filename: &str, data: &[u8]) -> StorageResult<()> {
        self.inner.save(filename, data)
    }

    fn delete(&self, filename: &str) -> StorageResult<()> {
        self.inner.delete(filename)
    }

    async fn load_bytes_async(&self, filename: &str) -> LoadResult<Vec<u8>> {
        let inner = Arc::clone(&self.inner);
        let filename = filename.to_owned();
        match tokio::task::spawn_blocking(move || inner.load(&filename)).await {
            Ok(result) => result,
            Err(e) => LoadResult::error(StorageError::Task(e.to_string())),
        }
    }

    async fn save_bytes_async(&self, filename: &str, data: &[u8]) -> StorageResult<()> {
        let inner = Arc::clone(&self.inner);
        let filename = filename.to_owned();
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || inner.save(&filename, &data))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}
