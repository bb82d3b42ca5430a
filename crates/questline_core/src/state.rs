//! The application state aggregate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The single aggregate root of a Questline session.
///
/// The state is a mapping of named domain collections (tasks, habits,
/// shop items, ...) plus a logical timestamp. The core never interprets
/// collection contents; they are arbitrary JSON values.
///
/// Serialized form is one flat JSON object:
///
/// ```json
/// { "updatedAt": 1700000000000, "tasks": [], "habits": [] }
/// ```
///
/// Collections are kept in key order, so serializing equal states always
/// yields identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationState {
    /// Milliseconds since the Unix epoch at commit time.
    #[serde(rename = "updatedAt", default)]
    pub updated_at: u64,
    /// Domain collections, keyed by name.
    #[serde(flatten)]
    pub collections: Map<String, Value>,
}

impl ApplicationState {
    /// Creates an empty state with `updated_at == 0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty state stamped at `updated_at`.
    #[must_use]
    pub fn at(updated_at: u64) -> Self {
        Self {
            updated_at,
            collections: Map::new(),
        }
    }

    /// Returns this state with `name` set to `value`.
    #[must_use]
    pub fn with_collection(mut self, name: impl Into<String>, value: Value) -> Self {
        self.collections.insert(name.into(), value);
        self
    }

    /// Returns the collection stored under `name`.
    pub fn collection(&self, name: &str) -> Option<&Value> {
        self.collections.get(name)
    }

    /// Returns a mutable reference to the collection stored under `name`.
    pub fn collection_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.collections.get_mut(name)
    }

    /// Sets `name` to `value`, returning the previous value.
    pub fn set_collection(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.collections.insert(name.into(), value)
    }

    /// Removes the collection stored under `name`.
    pub fn remove_collection(&mut self, name: &str) -> Option<Value> {
        self.collections.remove(name)
    }

    /// Serializes the state to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be represented as JSON.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Deserializes a state from a JSON value.
    ///
    /// A missing `updatedAt` decodes as `0`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not an object or `updatedAt` is not
    /// an unsigned integer.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}
