//! Explicitly trimmed resource cache.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

struct Slot<V> {
    value: Arc<V>,
    released: bool,
}

/// Caches loaded resources by key until their owner releases them.
///
/// Nothing is evicted behind the owner's back. A released entry is no longer
/// returned and is reloaded on the next request; [`trim`](Self::trim)
/// drops released entries, [`expire`](Self::expire) drops everything. A
/// loader returning `None` is not cached, so a missing resource is retried.
pub struct ResourceCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for ResourceCache<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> fmt::Debug for ResourceCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("entries", &self.slots.lock().len())
            .finish()
    }
}

impl<K: Eq + Hash + Clone, V> ResourceCache<K, V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live cached value for `key`.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.slots
            .lock()
            .get(key)
            .filter(|slot| !slot.released)
            .map(|slot| Arc::clone(&slot.value))
    }

    /// Returns the cached value, or loads and caches it.
    pub fn get_or_load(&self, key: K, load: impl FnOnce(&K) -> Option<V>) -> Option<Arc<V>> {
        if let Some(hit) = self.get(&key) {
            return Some(hit);
        }
        let value = Arc::new(load(&key)?);
        Some(self.insert_if_vacant(key, value))
    }

    /// Asynchronous [`get_or_load`](Self::get_or_load).
    ///
    /// The lock is not held while loading. If two callers load the same key
    /// at once, the first to finish is cached and both get its value.
    pub async fn get_or_load_async<F, Fut>(&self, key: K, load: F) -> Option<Arc<V>>
    where
        F: FnOnce(&K) -> Fut,
        Fut: Future<Output = Option<V>>,
    {
        if let Some(hit) = self.get(&key) {
            return Some(hit);
        }
        let value = Arc::new(load(&key).await?);
        Some(self.insert_if_vacant(key, value))
    }

    fn insert_if_vacant(&self, key: K, value: Arc<V>) -> Arc<V> {
        let mut slots = self.slots.lock();
        match slots.get(&key) {
            Some(slot) if !slot.released => Arc::clone(&slot.value),
            _ => {
                slots.insert(
                    key,
                    Slot {
                        value: Arc::clone(&value),
                        released: false,
                    },
                );
                value
            }
        }
    }

    /// Marks `key` as released by its owner. Returns false if not cached.
    pub fn release(&self, key: &K) -> bool {
        match self.slots.lock().get_mut(key) {
            Some(slot) => {
                slot.released = true;
                true
            }
            None => false,
        }
    }

    /// Drops released entries and returns how many were dropped.
    pub fn trim(&self) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| !slot.released);
        before - slots.len()
    }

    /// Drops every entry.
    pub fn expire(&self) {
        self.slots.lock().clear();
    }

    /// Number of entries, released ones included.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn loads_once() {
        let cache = ResourceCache::new();
        let loads = Cell::new(0);
        let load = |key: &&str| {
            loads.set(loads.get() + 1);
            Some(key.len())
        };

        assert_eq!(*cache.get_or_load("icon", load).unwrap(), 4);
        assert_eq!(*cache.get_or_load("icon", load).unwrap(), 4);
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn missing_resource_is_retried() {
        let cache: ResourceCache<&str, u32> = ResourceCache::new();
        assert!(cache.get_or_load("bgm", |_| None).is_none());
        assert!(cache.is_empty());
        assert_eq!(*cache.get_or_load("bgm", |_| Some(1)).unwrap(), 1);
    }

    #[test]
    fn released_entries_reload_and_trim() {
        let cache = ResourceCache::new();
        cache.get_or_load("a", |_| Some(1));
        cache.get_or_load("b", |_| Some(2));

        assert!(cache.release(&"a"));
        assert!(!cache.release(&"missing"));
        assert!(cache.get(&"a").is_none());

        assert_eq!(cache.trim(), 1);
        assert_eq!(cache.len(), 1);

        assert_eq!(*cache.get_or_load("a", |_| Some(10)).unwrap(), 10);
    }

    #[test]
    fn handed_out_values_survive_expire() {
        let cache = ResourceCache::new();
        let held = cache.get_or_load(1, |_| Some("texture".to_string())).unwrap();

        cache.expire();
        assert!(cache.is_empty());
        assert_eq!(held.as_str(), "texture");
    }

    #[tokio::test]
    async fn async_loader() {
        let cache = ResourceCache::new();
        let value = cache
            .get_or_load_async("config", |key| {
                let key = key.to_string();
                async move { Some(key.to_uppercase()) }
            })
            .await
            .unwrap();
        assert_eq!(value.as_str(), "CONFIG");

        let again = cache
            .get_or_load_async("config", |_| async { None })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&value, &again));
    }
}
