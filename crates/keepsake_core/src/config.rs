//! Coordinator configuration.

/// Configuration for a [`FileCoordinator`](crate::FileCoordinator).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Whether loaded and saved bytes are remembered per filename.
    pub cache_enabled: bool,

    /// Whether a save whose bytes equal the cached bytes skips the physical
    /// write. Only effective with the cache enabled.
    pub dedup_writes: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            dedup_writes: true,
        }
    }
}

impl CoordinatorConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the byte cache is used.
    #[must_use]
    pub const fn cache_enabled(mut self, value: bool) -> Self {
        self.cache_enabled = value;
        self
    }

    /// Sets whether redundant writes are skipped.
    #[must_use]
    pub const fn dedup_writes(mut self, value: bool) -> Self {
        self.dedup_writes = value;
        self
    }
}
