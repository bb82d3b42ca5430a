//! Removal of absent values before a remote write.
//!
//! The remote store rejects documents containing the "absent" marker. In
//! JSON that marker is `null`: an object field holding `null` carries no
//! information the store can keep, so it is removed at every depth.
//! Array elements are never removed (that would shift indices); objects
//! nested inside arrays are still cleaned.

use serde_json::Value;

/// Returns a copy of `value` with every `null` object field removed, at any depth.
///
/// Defined values are never altered.
///
/// # Example
///
/// ```rust
/// use questline_sync_protocol::sanitize;
/// use serde_json::json;
///
/// let clean = sanitize(&json!({"a": null, "b": {"c": null, "d": 1}}));
/// assert_eq!(clean, json!({"b": {"d": 1}}));
/// ```
#[must_use]
pub fn sanitize(value: &Value) -> Value {
    let mut copy = value.clone();
    sanitize_in_place(&mut copy);
    copy
}

/// In-place variant of [`sanitize`].
pub fn sanitize_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            for v in map.values_mut() {
                sanitize_in_place(v);
            }
        }
        Value::Array(items) => {
            for item in items {
                sanitize_in_place(item);
            }
        }
        _ => {}
    }
}

/// Returns true if no object at any depth holds a `null` field.
#[must_use]
pub fn is_sanitized(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.values().all(|v| !v.is_null() && is_sanitized(v)),
        Value::Array(items) => items.iter().all(is_sanitized),
        _ => true,
    }
}
