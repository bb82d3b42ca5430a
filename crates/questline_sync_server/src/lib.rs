//! # Questline Sync Server
//!
//! Reference document store for Questline sync.
//!
//! This crate provides:
//! - [`DocumentServer`], an in-process [`DocumentStore`] with snapshot listeners
//! - Document validation (no absent-marker fields, optional size limit)
//! - Connectivity and permission switches for exercising failure paths
//! - Deferred notification delivery for simulating slow networks
//!
//! # Architecture
//!
//! The server keeps one JSON document per path, each with a version that
//! increases on every write. Listeners registered for a path are invoked
//! after each successful write, on the writer's thread unless delivery is
//! deferred.
//!
//! ```rust
//! use questline_sync_protocol::{DocumentStore, Identity};
//! use questline_sync_server::DocumentServer;
//! use serde_json::json;
//!
//! let server = DocumentServer::new();
//! let path = Identity::new("u1").document_path();
//! server.set(&path, json!({"updatedAt": 1})).unwrap();
//! assert_eq!(server.get(&path).unwrap(), Some(json!({"updatedAt": 1})));
//! ```
//!
//! [`DocumentStore`]: questline_sync_protocol::DocumentStore

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod listeners;
mod server;

pub use config::{Delivery, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::{DocumentServer, ServerStats};
