//! Preference-store storage resolver.
//!
//! Preference stores hold string values under string keys. Bytes are
//! base64-encoded on the way in and decoded on the way out; a missing key
//! is [`LoadResult::NotFound`].

use crate::error::{StorageError, StorageResult};
use crate::load_result::LoadResult;
use crate::resolver::StorageResolver;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A string key/value preference store.
pub trait PreferenceStore: Send + Sync {
    /// Returns true if the key holds a value.
    fn has_key(&self, key: &str) -> bool;

    /// Returns the value stored under `key`.
    fn get_string(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot persist the change.
    fn set_string(&self, key: &str, value: String) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot persist the change.
    fn delete_key(&self, key: &str) -> StorageResult<()>;
}

/// A preference store that lives only in memory.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryPreferences {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn has_key(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set_string(&self, key: &str, value: String) -> StorageResult<()> {
        self.values.write().insert(key.to_owned(), value);
        Ok(())
    }

    fn delete_key(&self, key: &str) -> StorageResult<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// A preference store persisted as a single JSON object of string pairs.
///
/// The file is rewritten on every change, and a change that fails to reach
/// the file is not kept in memory either. Keys are kept sorted so the
/// file diffs cleanly.
#[derive(Debug)]
pub struct JsonFilePreferences {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl JsonFilePreferences {
    /// Opens the store at `path`, loading existing values if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::preferences(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(values)
            .map_err(|e| StorageError::preferences(e.to_string()))?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn has_key(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set_string(&self, key: &str, value: String) -> StorageResult<()> {
        let mut values = self.values.write();
        let mut next = values.clone();
        next.insert(key.to_owned(), value);
        self.persist(&next)?;
        *values = next;
        Ok(())
    }

    fn delete_key(&self, key: &str) -> StorageResult<()> {
        let mut values = self.values.write();
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.persist(&next)?;
        *values = next;
        Ok(())
    }
}

/// A storage resolver over a [`PreferenceStore`].
///
/// Preference stores never block, so the asynchronous operations use the
/// synchronous defaults.
#[derive(Debug)]
pub struct PrefsStorage<P> {
    store: P,
}

impl<P: PreferenceStore> PrefsStorage<P> {
    /// Wraps a preference store.
    pub fn new(store: P) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &P {
        &self.store
    }
}

#[async_trait]
impl<P: PreferenceStore> StorageResolver for PrefsStorage<P> {
    fn any_exist(&self, filenames: &[&str]) -> bool {
        filenames.iter().any(|name| {
            self.store
                .get_string(name)
                .is_some_and(|value| !value.is_empty())
        })
    }

    fn load_bytes(&self, filename: &str) -> LoadResult<Vec<u8>> {
        // An empty value reads as absent.
        let value = match self.store.get_string(filename) {
            Some(value) if !value.is_empty() => value,
            _ => return LoadResult::not_found(),
        };
        match STANDARD.decode(value) {
            Ok(bytes) => LoadResult::Succeeded(bytes),
            Err(e) => LoadResult::error(StorageError::Encoding {
                key: filename.to_owned(),
                message: e.to_string(),
            }),
        }
    }

    fn save_bytes(&self, filename: &str, data: &[u8]) -> StorageResult<()> {
        self.store.set_string(filename, STANDARD.encode(data))
    }

    fn delete(&self, filename: &str) -> StorageResult<()> {
        self.store.delete_key(filename)
    }
}
