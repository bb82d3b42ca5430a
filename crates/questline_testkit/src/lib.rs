//! # Questline Testkit
//!
//! Test utilities for Questline sync.
//!
//! This crate provides:
//! - Fixtures: sample states, temporary snapshot directories, a shared server
//! - Property-based generators using proptest
//! - [`FlakyDocumentStore`], a fault-injecting remote store wrapper
//! - [`init_test_tracing`] for log output in tests
//!
//! ## Usage
//!
//! ```rust
//! use questline_testkit::prelude::*;
//!
//! let (server, path) = shared_server("u1");
//! let flaky = FlakyDocumentStore::new(server);
//! flaky.set_online(false);
//! assert!(!flaky.is_online());
//! # let _ = path;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use logging::*;
