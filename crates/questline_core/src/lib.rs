//! # Questline Core
//!
//! The state synchronization core for Questline.
//!
//! This crate provides:
//! - [`ApplicationState`], the single aggregate root
//! - [`StateStore`], the canonical in-memory container and mutation dispatcher
//! - Last-write-wins conflict resolution ([`conflict`])
//! - [`EchoGuard`], which keeps remote-originated commits from being pushed back
//! - [`LocalPersistence`], the snapshot adapter over a [`KeyValueStore`]
//!
//! ## Key Invariants
//!
//! - Exactly one `ApplicationState` is canonical at any instant
//! - `updated_at` strictly increases on every local commit
//! - All writes funnel through [`StateStore::mutate`], [`StateStore::replace_from_remote`]
//!   or [`StateStore::force_replace`]
//! - The store performs no I/O; persistence and sync react to commits
//!
//! [`KeyValueStore`]: questline_storage::KeyValueStore

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
pub mod conflict;
mod device;
mod echo;
mod error;
mod persistence;
mod state;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StoreConfig;
pub use conflict::{decide, resolve, ConflictResolution};
pub use device::{DeviceId, PushOrigin};
pub use echo::{EchoGuard, EchoPolicy, GuardState, DEFAULT_ECHO_WINDOW};
pub use error::{PersistenceError, PersistenceResult};
pub use persistence::{LocalPersistence, PREFERENCES_KEY, STATE_KEY};
pub use state::ApplicationState;
pub use store::{CommitEvent, CommitOrigin, MergeOutcome, StateStore, Subscription};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
