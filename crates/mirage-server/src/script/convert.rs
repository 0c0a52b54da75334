//! JSON <-> Rhai value conversion.

use rhai::{Dynamic, Map};
use serde_json::Value;

/// `null` becomes `()`, so scripts cannot tell it apart from a missing value.
pub(crate) fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => Dynamic::from(items.iter().map(json_to_dynamic).collect::<Vec<_>>()),
        Value::Object(object) => {
            let map: Map = object
                .iter()
                .map(|(key, value)| (key.as_str().into(), json_to_dynamic(value)))
                .collect();
            Dynamic::from(map)
        }
    }
}

pub(crate) fn dynamic_to_json(value: Dynamic) -> Value {
    if value.is_unit() {
        Value::Null
    } else if let Ok(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Ok(i) = value.as_int() {
        Value::Number(i.into())
    } else if let Ok(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if value.is_string() {
        Value::String(value.into_string().unwrap_or_default())
    } else if value.is_array() {
        let items = value.cast::<rhai::Array>();
        Value::Array(items.into_iter().map(dynamic_to_json).collect())
    } else if value.is_map() {
        let map = value.cast::<Map>();
        Value::Object(
            map.into_iter()
                .map(|(key, value)| (key.to_string(), dynamic_to_json(value)))
                .collect(),
        )
    } else {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_survives_round_trip() {
        let value = json!({"name": "Ada", "age": 36, "score": 1.5, "tags": ["a", true], "nested": {"x": 1}});
        assert_eq!(dynamic_to_json(json_to_dynamic(&value)), value);
    }

    #[test]
    fn test_null_becomes_unit() {
        assert!(json_to_dynamic(&Value::Null).is_unit());
        assert_eq!(dynamic_to_json(Dynamic::UNIT), Value::Null);
    }
}
