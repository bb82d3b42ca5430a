//! # Questline Sync Protocol
//!
//! Types shared by every party to remote sync.
//!
//! This crate provides:
//! - [`Identity`] and [`DocumentPath`] (`users/{uid}`)
//! - [`RemoteDocument`], the on-store shape of an application state
//! - [`sanitize`], which strips values the remote store rejects
//! - [`DocumentStore`], the contract a remote document store implements
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod identity;
mod sanitize;
mod store;

pub use document::{RemoteDocument, ORIGIN_FIELD};
pub use error::{ProtocolError, ProtocolResult, RemoteError, RemoteResult};
pub use identity::{DocumentPath, Identity};
pub use sanitize::{is_sanitized, sanitize, sanitize_in_place};
pub use store::{DocumentStore, ListenerRegistration, SnapshotCallback};
