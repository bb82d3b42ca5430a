//! Configuration for the sync engine.

use questline_core::{DeviceId, STATE_KEY};
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Device ID stamped on every push.
    pub device_id: DeviceId,
    /// Key of the local snapshot.
    pub storage_key: String,
    /// Deadline for each remote call.
    pub request_timeout: Duration,
    /// Retry configuration for the pending push.
    pub retry: RetryConfig,
    /// Whether manual resync first retries a pending push.
    pub flush_pending_on_resync: bool,
}

impl SyncConfig {
    /// Creates a configuration for `device_id`.
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            storage_key: STATE_KEY.to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            flush_pending_on_resync: true,
        }
    }

    /// Sets the local snapshot key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets whether manual resync retries a pending push first.
    pub fn with_flush_pending_on_resync(mut self, flush: bool) -> Self {
        self.flush_pending_on_resync = flush;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DeviceId::new())
    }
}

/// Backoff schedule for a push parked in the pending slot.
///
/// After the `n`th failed attempt the push is retried after
/// `initial_delay * backoff_multiplier^(n-1)`, capped at `max_delay`.
/// Once `max_attempts` attempts have failed the state is dropped and the
/// next commit carries it instead.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts per state, the first push included.
    pub max_attempts: u32,
    /// Wait after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on any single wait, before jitter.
    pub max_delay: Duration,
    /// Growth factor between consecutive waits.
    pub backoff_multiplier: f64,
    /// Stretch each wait by a random factor of up to a quarter.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Allows `max_attempts` attempts with the default schedule
    /// (500ms doubling up to one minute, jittered).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Never parks a failed push; the next commit is the only retry.
    pub fn no_retry() -> Self {
        Self {
            backoff_multiplier: 1.0,
            add_jitter: false,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::new(1)
        }
    }

    /// Sets the wait after the first failure.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Caps every wait at `delay`.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor between waits.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Turns jitter on or off.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.add_jitter = jitter;
        self
    }

    /// Returns true if a state that has failed `failed` times may be tried again.
    pub fn allows_retry(&self, failed: u32) -> bool {
        failed < self.max_attempts
    }

    /// Returns how long to wait after the `failed`th failure.
    ///
    /// Zero failures means no wait.
    pub fn delay_for_attempt(&self, failed: u32) -> Duration {
        let Some(steps) = failed.checked_sub(1) else {
            return Duration::ZERO;
        };
        let growth = self
            .backoff_multiplier
            .powi(i32::try_from(steps).unwrap_or(i32::MAX));
        let wait = (self.initial_delay.as_secs_f64() * growth).min(self.max_delay.as_secs_f64());

        let stretch = if self.add_jitter {
            1.0 + 0.25 * jitter_fraction()
        } else {
            1.0
        };
        Duration::from_secs_f64(wait * stretch)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5)
    }
}

/// A value in `[0, 1)` derived from the wall clock's sub-second part.
fn jitter_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |since| since.subsec_nanos());
    f64::from(nanos % 1024) / 1024.0
}
