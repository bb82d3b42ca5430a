//! Conflict resolution between the local and a remote state.
//!
//! The policy is **last-write-wins over the whole aggregate**: the candidate
//! with the greater `updated_at` replaces the other in full. Ties keep the
//! local state. There is no per-field merge, so concurrent edits to
//! different collections on two devices lose one side's edits.

use crate::state::ApplicationState;

/// Outcome of comparing a local and a remote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Keep the local state; discard the remote one.
    KeepLocal,
    /// Replace the local state with the remote one.
    AcceptRemote,
}

impl ConflictResolution {
    /// Returns true if the remote state wins.
    pub fn accepts_remote(&self) -> bool {
        matches!(self, ConflictResolution::AcceptRemote)
    }
}

/// Decides which of two states is current.
///
/// Returns [`ConflictResolution::AcceptRemote`] iff
/// `remote.updated_at > local.updated_at`.
#[must_use]
pub fn decide(local: &ApplicationState, remote: &ApplicationState) -> ConflictResolution {
    if remote.updated_at > local.updated_at {
        ConflictResolution::AcceptRemote
    } else {
        ConflictResolution::KeepLocal
    }
}

/// Returns the state to keep.
#[must_use]
pub fn resolve(local: &ApplicationState, remote: &ApplicationState) -> ApplicationState {
    match decide(local, remote) {
        ConflictResolution::AcceptRemote => remote.clone(),
        ConflictResolution::KeepLocal => local.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn newer_remote_wins() {
        let local = ApplicationState::at(100).with_collection("tasks", json!([]));
        let remote = ApplicationState::at(150).with_collection("tasks", json!(["x"]));
        assert_eq!(decide(&local, &remote), ConflictResolution::AcceptRemote);
        assert_eq!(resolve(&local, &remote), remote);
    }

    #[test]
    fn older_remote_is_discarded() {
        let local = ApplicationState::at(150).with_collection("tasks", json!(["x"]));
        let remote = ApplicationState::at(100).with_collection("tasks", json!([]));
        assert_eq!(decide(&local, &remote), ConflictResolution::KeepLocal);
        assert_eq!(resolve(&local, &remote), local);
    }

    #[test]
    fn tie_keeps_local() {
        let local = ApplicationState::at(100).with_collection("gold", json!(1));
        let remote = ApplicationState::at(100).with_collection("gold", json!(2));
        assert_eq!(decide(&local, &remote), ConflictResolution::KeepLocal);
        assert_eq!(resolve(&local, &remote).collection("gold"), Some(&json!(1)));
    }

    #[test]
    fn whole_aggregate_replace_drops_local_only_collections() {
        let local = ApplicationState::at(100)
            .with_collection("tasks", json!(["mine"]))
            .with_collection("diary", json!(["entry"]));
        let remote = ApplicationState::at(101).with_collection("tasks", json!(["theirs"]));

        let kept = resolve(&local, &remote);
        assert_eq!(kept.collection("tasks"), Some(&json!(["theirs"])));
        assert!(kept.collection("diary").is_none());
    }

    proptest! {
        #[test]
        fn remote_wins_iff_strictly_newer(local_ts in any::<u64>(), remote_ts in any::<u64>()) {
            let local = ApplicationState::at(local_ts).with_collection("side", json!("local"));
            let remote = ApplicationState::at(remote_ts).with_collection("side", json!("remote"));

            let kept = resolve(&local, &remote);
            if remote_ts > local_ts {
                prop_assert_eq!(kept, remote);
            } else {
                prop_assert_eq!(kept, local);
            }
        }
    }
}
