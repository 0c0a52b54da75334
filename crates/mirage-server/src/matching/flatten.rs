//! Flattening of nested JSON into dotted-path leaves.

use serde_json::Value;
use std::collections::BTreeMap;

/// Flatten objects and arrays into `path -> leaf` pairs.
///
/// Keys are joined with `.`; array elements use their index. Empty nested
/// containers are kept as leaves. A scalar or an empty container at the root
/// yields no leaves.
pub fn flatten(value: &Value) -> BTreeMap<String, &Value> {
    let mut leaves = BTreeMap::new();
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(key.clone(), child, &mut leaves);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(index.to_string(), child, &mut leaves);
            }
        }
        _ => {}
    }
    leaves
}

fn flatten_into<'a>(path: String, value: &'a Value, leaves: &mut BTreeMap<String, &'a Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(format!("{path}.{key}"), child, leaves);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(format!("{path}.{index}"), child, leaves);
            }
        }
        _ => {
            leaves.insert(path, value);
        }
    }
}
