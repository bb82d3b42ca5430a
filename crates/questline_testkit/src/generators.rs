//! Property-based test generators using proptest.
//!
//! Provides strategies for JSON values (with and without absent markers)
//! and whole application states.

use questline_core::ApplicationState;
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for generating collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9]{0,11}")
        .expect("Invalid regex")
        .prop_filter("updatedAt is reserved", |s| s != "updatedAt")
}

/// Strategy for generating scalar JSON values, `null` included.
pub fn json_leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Null),
        2 => any::<bool>().prop_map(Value::Bool),
        3 => any::<i64>().prop_map(Value::from),
        3 => "[ -~]{0,12}".prop_map(Value::String),
    ]
}

/// Strategy for generating nested JSON values that may contain `null`s.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    json_leaf_strategy().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                .prop_map(|entries| Value::Object(entries.into_iter().collect())),
        ]
    })
}

/// Strategy for generating application states stamped with a timestamp
/// in `0..max_updated_at`.
pub fn state_strategy(max_updated_at: u64) -> impl Strategy<Value = ApplicationState> {
    (
        0..max_updated_at,
        prop::collection::btree_map(collection_name_strategy(), json_value_strategy(), 0..5),
    )
        .prop_map(|(updated_at, collections)| {
            let mut map = Map::new();
            for (name, value) in collections {
                map.insert(name, value);
            }
            ApplicationState {
                updated_at,
                collections: map,
            }
        })
}

/// Strategy for generating `(local, remote)` timestamp pairs, with ties
/// and neighbours over-represented.
pub fn timestamp_pair_strategy() -> impl Strategy<Value = (u64, u64)> {
    prop_oneof![
        (0u64..1_000_000, 0u64..1_000_000),
        (0u64..1_000_000).prop_map(|t| (t, t)),
        (1u64..1_000_000).prop_map(|t| (t, t - 1)),
        (0u64..1_000_000).prop_map(|t| (t, t + 1)),
    ]
}
