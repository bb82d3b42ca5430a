//! State store configuration.

use crate::echo::{EchoPolicy, DEFAULT_ECHO_WINDOW};

/// Configuration for a [`StateStore`](crate::StateStore).
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// How the echo guard decides which commits to suppress.
    pub echo_policy: EchoPolicy,
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the echo policy.
    #[must_use]
    pub const fn with_echo_policy(mut self, policy: EchoPolicy) -> Self {
        self.echo_policy = policy;
        self
    }

    /// Uses the legacy debounce window of [`DEFAULT_ECHO_WINDOW`].
    #[must_use]
    pub const fn with_debounce_window(self) -> Self {
        self.with_echo_policy(EchoPolicy::Window(DEFAULT_ECHO_WINDOW))
    }
}
