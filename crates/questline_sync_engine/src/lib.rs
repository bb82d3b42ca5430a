//! # Questline Sync Engine
//!
//! Keeps the canonical state store, the local snapshot and the remote
//! document in step.
//!
//! This crate provides:
//! - [`RemoteSyncAdapter`] (push, pull, subscribe over a [`DocumentStore`])
//! - [`SyncScheduler`], the worker that reacts to commits and inbound snapshots
//! - A pending push slot retried with exponential backoff
//! - [`StateHandle`], the facade handed to feature code
//!
//! ## Architecture
//!
//! ```text
//!  feature code ──mutate──▶ StateStore ──commit──▶ job queue ──▶ worker
//!                                ▲                                 │
//!                                │ replace_from_remote      save / push
//!                                │                                 ▼
//!                           inbound jobs ◀──on_snapshot── remote document
//! ```
//!
//! Commits never wait on I/O. The store listener only enqueues a job; a
//! single tokio task performs every save and remote call, in commit order.
//!
//! ## Key Invariants
//!
//! - Only local commits are pushed
//! - A device never re-pushes a state it just accepted from the remote
//! - A device recognizes its own pushes when they are reflected back
//! - Remote calls are bounded by [`SyncConfig::request_timeout`]
//!
//! [`DocumentStore`]: questline_sync_protocol::DocumentStore

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod handle;
mod remote;
mod scheduler;
mod state;

pub use config::{RetryConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use handle::StateHandle;
pub use remote::RemoteSyncAdapter;
pub use scheduler::{ResyncOutcome, SchedulerBuilder, SyncScheduler};
pub use state::{SyncStats, SyncStatus};
