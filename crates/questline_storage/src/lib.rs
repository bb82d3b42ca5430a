//! # Questline Storage
//!
//! Key/value storage backends for Questline's local snapshot.
//!
//! Backends are **opaque string stores**: they do not know what the
//! values mean. The state core serializes its aggregate to a string and
//! stores it under a fixed key.
//!
//! ## Available Backends
//!
//! - [`InMemoryKvStore`] - For tests and ephemeral sessions, with an optional quota
//! - [`FileKvStore`] - One file per key inside a locked directory
//!
//! ## Example
//!
//! ```rust
//! use questline_storage::{InMemoryKvStore, KeyValueStore};
//!
//! let store = InMemoryKvStore::new();
//! store.set("questline.state", "{\"updatedAt\":1}").unwrap();
//! assert_eq!(store.get("questline.state").unwrap().as_deref(), Some("{\"updatedAt\":1}"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod kv;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileKvStore;
pub use kv::KeyValueStore;
pub use memory::InMemoryKvStore;
