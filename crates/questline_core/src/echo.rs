//! Echo suppression.
//!
//! A remote document store notifies every subscriber of every write,
//! including the writer itself. Without suppression a device would:
//!
//! 1. accept a remote state and commit it locally,
//! 2. push that commit straight back to the remote,
//! 3. receive its own push as a "new" remote event, and so on.
//!
//! The [`EchoGuard`] breaks the loop on both sides. Outbound, it suppresses
//! the push for the commit that applied a remote state. Inbound, it
//! recognizes documents stamped with this device's last [`PushOrigin`].
//!
//! ## Policies
//!
//! - [`EchoPolicy::Exact`] suppresses only the commit carrying the armed
//!   timestamp. Unrelated local commits are pushed normally.
//! - [`EchoPolicy::Window`] suppresses every commit for a fixed debounce
//!   window after arming, then reopens on its own.

use crate::device::PushOrigin;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Debounce window used by [`EchoPolicy::Window`] when none is configured.
pub const DEFAULT_ECHO_WINDOW: Duration = Duration::from_millis(100);

/// How the guard decides which commits to suppress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EchoPolicy {
    /// Suppress exactly the commit that applied a remote state.
    #[default]
    Exact,
    /// Suppress every commit within the window after a remote state was applied.
    Window(Duration),
}

/// Observable state of the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Pushes are allowed.
    Open,
    /// The next matching push will be skipped.
    Suppressed,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    updated_at: u64,
    at: Instant,
}

#[derive(Debug, Default)]
struct GuardInner {
    armed: Option<Armed>,
    last_push: Option<PushOrigin>,
}

/// Suppresses pushes of remote-originated commits and recognizes echoes.
#[derive(Debug, Default)]
pub struct EchoGuard {
    policy: EchoPolicy,
    inner: Mutex<GuardInner>,
}

impl EchoGuard {
    /// Creates an open guard with the given policy.
    #[must_use]
    pub fn new(policy: EchoPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(GuardInner::default()),
        }
    }

    /// Returns the guard's policy.
    pub fn policy(&self) -> EchoPolicy {
        self.policy
    }

    /// Arms the guard for the commit stamped `updated_at`.
    ///
    /// Called right before a remote-originated state is committed.
    pub fn arm(&self, updated_at: u64) {
        self.inner.lock().armed = Some(Armed {
            updated_at,
            at: Instant::now(),
        });
    }

    /// Returns the current state.
    pub fn state(&self) -> GuardState {
        let mut inner = self.inner.lock();
        match (self.policy, inner.armed) {
            (_, None) => GuardState::Open,
            (EchoPolicy::Exact, Some(_)) => GuardState::Suppressed,
            (EchoPolicy::Window(window), Some(armed)) => {
                if armed.at.elapsed() < window {
                    GuardState::Suppressed
                } else {
                    inner.armed = None;
                    GuardState::Open
                }
            }
        }
    }

    /// Returns whether the commit stamped `updated_at` may be pushed.
    ///
    /// Under [`EchoPolicy::Exact`] a match consumes the arming, so the guard
    /// is Open again for every later commit.
    pub fn should_push(&self, updated_at: u64) -> bool {
        let mut inner = self.inner.lock();
        let Some(armed) = inner.armed else {
            return true;
        };

        match self.policy {
            EchoPolicy::Exact => {
                if armed.updated_at == updated_at {
                    inner.armed = None;
                    false
                } else {
                    true
                }
            }
            EchoPolicy::Window(window) => {
                if armed.at.elapsed() < window {
                    false
                } else {
                    inner.armed = None;
                    true
                }
            }
        }
    }

    /// Records the origin of a push this device is about to issue.
    ///
    /// Must be called before the write reaches the remote store, since the
    /// store may deliver the resulting snapshot before the write returns.
    pub fn record_push(&self, origin: PushOrigin) {
        self.inner.lock().last_push = Some(origin);
    }

    /// Returns the origin of the last push this device issued.
    pub fn last_push(&self) -> Option<PushOrigin> {
        self.inner.lock().last_push
    }

    /// Returns true if an inbound document stamped `origin` is this
    /// device's own last push reflected back.
    pub fn is_echo(&self, origin: Option<&PushOrigin>) -> bool {
        match (origin, self.inner.lock().last_push) {
            (Some(origin), Some(last)) => *origin == last,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;
    use std::thread;

    #[test]
    fn new_guard_is_open() {
        let guard = EchoGuard::new(EchoPolicy::Exact);
        assert_eq!(guard.state(), GuardState::Open);
        assert!(guard.should_push(1));
    }

    #[test]
    fn exact_suppresses_only_armed_commit_once() {
        let guard = EchoGuard::new(EchoPolicy::Exact);
        guard.arm(200);
        assert_eq!(guard.state(), GuardState::Suppressed);

        // An unrelated local commit racing in is still pushed
        assert!(guard.should_push(201));
        assert_eq!(guard.state(), GuardState::Suppressed);

        assert!(!guard.should_push(200));
        assert_eq!(guard.state(), GuardState::Open);
        assert!(guard.should_push(200));
    }

    #[test]
    fn window_suppresses_everything_then_reopens() {
        let guard = EchoGuard::new(EchoPolicy::Window(Duration::from_millis(30)));
        guard.arm(200);

        assert_eq!(guard.state(), GuardState::Suppressed);
        assert!(!guard.should_push(200));
        assert!(!guard.should_push(201));

        thread::sleep(Duration::from_millis(40));
        assert_eq!(guard.state(), GuardState::Open);
        assert!(guard.should_push(202));
    }

    #[test]
    fn echo_requires_exact_origin_match() {
        let guard = EchoGuard::default();
        let me = DeviceId::new();
        let other = DeviceId::new();

        assert!(!guard.is_echo(Some(&PushOrigin::new(me, 1))));

        guard.record_push(PushOrigin::new(me, 2));
        assert!(guard.is_echo(Some(&PushOrigin::new(me, 2))));
        assert!(!guard.is_echo(Some(&PushOrigin::new(me, 1))));
        assert!(!guard.is_echo(Some(&PushOrigin::new(other, 2))));
        assert!(!guard.is_echo(None));
        assert_eq!(guard.last_push(), Some(PushOrigin::new(me, 2)));
    }
}
