//! # keepsake storage
//!
//! Storage resolvers for keepsake.
//!
//! This crate provides the lowest-level persistence abstraction: "bytes on a
//! medium" keyed by logical filename. Resolvers are **opaque byte stores** -
//! they do not interpret the data they store.
//!
//! ## Design Principles
//!
//! - Resolvers load and replace whole files; there is no partial I/O
//! - Absence is [`LoadResult::NotFound`], other failures are
//!   [`LoadResult::Error`]; neither is ever a panic
//! - Must be `Send + Sync`; each resolver guards its own medium
//!
//! ## Available Resolvers
//!
//! - [`FileStorage`] - Files under a base directory
//! - [`PrefsStorage`] - Base64 strings in a [`PreferenceStore`]
//! - [`MemoryStorage`] - Ephemeral, instrumented store for tests
//!
//! ## Example
//!
//! ```rust
//! use keepsake_storage::{MemoryStorage, StorageResolver};
//!
//! let storage = MemoryStorage::new();
//! storage.save_bytes("save.dat", b"hello world").unwrap();
//! let loaded = storage.load_bytes("save.dat");
//! assert_eq!(loaded.value().unwrap(), b"hello world");
//! assert!(storage.load_bytes("missing.dat").is_not_found());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod load_result;
mod memory;
mod prefs;
mod resolver;

pub use error::{StorageError, StorageResult};
pub use file::FileStorage;
pub use load_result::{Cause, LoadResult, LoadState};
pub use memory::{MemoryStorage, WriteEvent};
pub use prefs::{JsonFilePreferences, MemoryPreferences, PreferenceStore, PrefsStorage};
pub use resolver::StorageResolver;
