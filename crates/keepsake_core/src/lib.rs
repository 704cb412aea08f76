//! # keepsake core
//!
//! Typed persistence for application state.
//!
//! This crate provides:
//! - [`FileCoordinator`] - typed save/load over a storage resolver with a
//!   write-through byte cache, redundant-write suppression and ordered
//!   asynchronous writes
//! - [`DefaultedFile`] / [`OptionalFile`] - lazily loaded single-file handles
//! - [`ShutdownVeto`] - keeps the process alive while a write is in progress
//! - [`ProgressSink`] and [`ProgressAggregator`] - explicit progress reporting
//! - [`ResourceCache`] - a keyed cache trimmed by its owner
//!
//! Loads never return an error: missing, unreadable and broken files are
//! distinct [`LoadResult`] states. Saves return [`CoreResult`] so a lost
//! write is never silent.
//!
//! ## Example
//!
//! ```rust
//! use keepsake_codec::{SerializationResolver, SerializerConfig};
//! use keepsake_core::FileCoordinator;
//! use keepsake_storage::{FileStorage, LoadState};
//! use std::sync::Arc;
//!
//! # let dir = tempfile::tempdir().unwrap();
//! let storage = Arc::new(FileStorage::with_subdirectory(dir.path(), "saves"));
//! let serializer = SerializationResolver::new(
//!     SerializerConfig::encrypted("password", b"app-salt".to_vec(), 1000),
//! ).unwrap();
//! let files = FileCoordinator::new(storage, serializer);
//!
//! assert_eq!(files.load::<Vec<String>>("inventory").state(), LoadState::NotFound);
//! files.save("inventory", &vec!["sword".to_string()]).unwrap();
//! assert!(files.any_exist(&["inventory"]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod file;
mod progress;
mod queue;
mod resource_cache;
mod shutdown;

pub use config::CoordinatorConfig;
pub use coordinator::FileCoordinator;
pub use error::{CoreError, CoreResult};
pub use file::{DefaultedFile, OptionalFile};
pub use progress::{ProgressAggregator, ProgressItem, ProgressSink, ScaledProgress};
pub use resource_cache::ResourceCache;
pub use shutdown::{ShutdownVeto, VetoGuard};

pub use keepsake_storage::{LoadResult, LoadState};
