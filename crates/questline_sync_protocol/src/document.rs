//! Remote document encoding.
//!
//! A remote document is the sanitized application state with one extra
//! top-level field, [`ORIGIN_FIELD`], naming the push that wrote it:
//!
//! ```json
//! {
//!   "updatedAt": 1700000000000,
//!   "tasks": [],
//!   "_origin": { "device": "7d0c...", "sequence": 12 }
//! }
//! ```
//!
//! Encoding is deterministic apart from [`ORIGIN_FIELD`]: pushing the same
//! state twice yields documents that are equal once `_origin` is removed,
//! but never byte-equal, because each push carries a fresh sequence.
//!
//! Documents written by older clients may lack `_origin` and even
//! `updatedAt`; both decode, but an untimestamped document never
//! participates in conflict resolution.

use crate::error::{ProtocolError, ProtocolResult};
use crate::sanitize::sanitize_in_place;
use questline_core::{ApplicationState, PushOrigin};
use serde_json::Value;

/// Top-level field carrying the [`PushOrigin`] of the write.
pub const ORIGIN_FIELD: &str = "_origin";

const TIMESTAMP_FIELD: &str = "updatedAt";

/// A decoded remote document.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    /// The application state carried by the document.
    pub state: ApplicationState,
    /// The push that wrote the document, if it was stamped.
    pub origin: Option<PushOrigin>,
    /// Whether the document carried an `updatedAt` field.
    pub timestamped: bool,
}

impl RemoteDocument {
    /// Creates a stamped, timestamped document.
    pub fn new(state: ApplicationState, origin: PushOrigin) -> Self {
        Self {
            state,
            origin: Some(origin),
            timestamped: true,
        }
    }

    /// Encodes `state` for a remote write.
    ///
    /// The state is sanitized and stamped with `origin`. Two encodings of
    /// the same state differ only in their `_origin` field.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if the state cannot be serialized.
    pub fn encode(state: &ApplicationState, origin: PushOrigin) -> ProtocolResult<Value> {
        let mut value = state.to_value()?;
        sanitize_in_place(&mut value);
        if let Value::Object(map) = &mut value {
            map.insert(ORIGIN_FIELD.to_string(), serde_json::to_value(origin)?);
        }
        Ok(value)
    }

    /// Encodes this document.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if the state cannot be serialized.
    pub fn to_value(&self) -> ProtocolResult<Value> {
        let mut value = self.state.to_value()?;
        sanitize_in_place(&mut value);
        if let Value::Object(map) = &mut value {
            if !self.timestamped {
                map.remove(TIMESTAMP_FIELD);
            }
            if let Some(origin) = self.origin {
                map.insert(ORIGIN_FIELD.to_string(), serde_json::to_value(origin)?);
            }
        }
        Ok(value)
    }

    /// Decodes a document read from the remote store.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object, or if `updatedAt`
    /// or `_origin` has the wrong shape.
    pub fn decode(value: Value) -> ProtocolResult<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            other => return Err(ProtocolError::NotAnObject(kind_of(&other))),
        };

        let origin = match map.remove(ORIGIN_FIELD) {
            None | Some(Value::Null) => None,
            Some(raw) => Some(serde_json::from_value(raw).map_err(|source| {
                ProtocolError::InvalidField {
                    field: ORIGIN_FIELD,
                    source,
                }
            })?),
        };

        let timestamped = map.get(TIMESTAMP_FIELD).is_some_and(|v| !v.is_null());
        if !timestamped {
            map.remove(TIMESTAMP_FIELD);
        }

        let state = ApplicationState::from_value(Value::Object(map)).map_err(|source| {
            ProtocolError::InvalidField {
                field: TIMESTAMP_FIELD,
                source,
            }
        })?;

        Ok(Self {
            state,
            origin,
            timestamped,
        })
    }

    /// Returns the document's timestamp.
    pub fn updated_at(&self) -> u64 {
        self.state.updated_at
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_core::DeviceId;
    use serde_json::json;

    fn origin(sequence: u64) -> PushOrigin {
        PushOrigin::new(DeviceId::from_bytes([7; 16]), sequence)
    }

    #[test]
    fn same_state_encodes_equal_except_origin() {
        let state = ApplicationState::at(10).with_collection("gold", json!(3));
        let mut first = RemoteDocument::encode(&state, origin(1)).unwrap();
        let mut second = RemoteDocument::encode(&state, origin(2)).unwrap();
        assert_ne!(first, second);

        first.as_object_mut().unwrap().remove(ORIGIN_FIELD);
        second.as_object_mut().unwrap().remove(ORIGIN_FIELD);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn encode_sanitizes_and_stamps() {
        let state = ApplicationState::at(10)
            .with_collection("tasks", json!([{"id": "a", "due": null}]))
            .with_collection("note", Value::Null);

        let value = RemoteDocument::encode(&state, origin(3)).unwrap();

        assert_eq!(value["updatedAt"], json!(10));
        assert_eq!(value["tasks"], json!([{"id": "a"}]));
        assert!(value.get("note").is_none());
        assert_eq!(value[ORIGIN_FIELD]["sequence"], json!(3));
    }

    #[test]
    fn decode_strips_origin_from_state() {
        let state = ApplicationState::at(10).with_collection("gold", json!(5));
        let value = RemoteDocument::encode(&state, origin(1)).unwrap();

        let doc = RemoteDocument::decode(value).unwrap();
        assert_eq!(doc.state, state);
        assert_eq!(doc.origin, Some(origin(1)));
        assert!(doc.timestamped);
        assert!(doc.state.collection(ORIGIN_FIELD).is_none());
    }

    #[test]
    fn decode_legacy_document_without_stamp() {
        let doc = RemoteDocument::decode(json!({"tasks": []})).unwrap();
        assert_eq!(doc.origin, None);
        assert!(!doc.timestamped);
        assert_eq!(doc.updated_at(), 0);
    }

    #[test]
    fn decode_null_timestamp_is_untimestamped() {
        let doc = RemoteDocument::decode(json!({"updatedAt": null, "gold": 1})).unwrap();
        assert!(!doc.timestamped);
        assert_eq!(doc.state.collection("gold"), Some(&json!(1)));
    }

    #[test]
    fn decode_rejects_non_objects() {
        let err = RemoteDocument::decode(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ProtocolError::NotAnObject("array")));
    }

    #[test]
    fn decode_rejects_bad_timestamp() {
        let err = RemoteDocument::decode(json!({"updatedAt": "yesterday"})).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidField {
                field: "updatedAt",
                ..
            }
        ));
    }

    #[test]
    fn decode_rejects_bad_origin() {
        let err = RemoteDocument::decode(json!({"updatedAt": 1, "_origin": 5})).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidField {
                field: ORIGIN_FIELD,
                ..
            }
        ));
    }

    #[test]
    fn to_value_omits_timestamp_for_untimestamped_documents() {
        let doc = RemoteDocument {
            state: ApplicationState::new().with_collection("gold", json!(2)),
            origin: None,
            timestamped: false,
        };
        assert_eq!(doc.to_value().unwrap(), json!({"gold": 2}));
    }
}
