//! Device identity and push origins.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one running writer of a remote document.
///
/// Device IDs are random UUIDs generated once per process (or persisted by
/// the host if it wants a stable identity). They are only used to tell this
/// device's own pushes apart from everyone else's.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Creates a new random device ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a device ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a device ID from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Converts to a UUID.
    #[must_use]
    pub const fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stamp attached to every outbound push.
///
/// `sequence` strictly increases per device, so a `(device, sequence)` pair
/// names exactly one push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PushOrigin {
    /// Device that issued the push.
    pub device: DeviceId,
    /// Per-device push counter.
    pub sequence: u64,
}

impl PushOrigin {
    /// Creates a push origin.
    #[must_use]
    pub const fn new(device: DeviceId, sequence: u64) -> Self {
        Self { device, sequence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_ids_are_unique() {
        assert_ne!(DeviceId::new(), DeviceId::new());
    }

    #[test]
    fn device_id_bytes_roundtrip() {
        let id = DeviceId::from_bytes([7u8; 16]);
        assert_eq!(id.to_uuid().as_bytes(), &[7u8; 16]);
    }

    #[test]
    fn push_origin_serializes_device_as_string() {
        let origin = PushOrigin::new(DeviceId::from_bytes([0u8; 16]), 3);
        let value = serde_json::to_value(origin).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "device": "00000000-0000-0000-0000-000000000000",
                "sequence": 3
            })
        );
    }
}
