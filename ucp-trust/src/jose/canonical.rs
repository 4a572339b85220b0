//! Canonical JSON for payload signatures.
//!
//! Object keys are sorted at every depth and the result is serialized
//! compactly. Forward slashes and non-ASCII characters are emitted verbatim,
//! so `"https://shop.example/ü"` stays as written.

use serde_json::{Map, Value};

use crate::error::Result;

/// Returns a copy of `value` with every object's keys sorted.
#[must_use]
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key.clone(), sort_keys(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Serializes `payload` canonically after removing the top-level `excluded` field.
///
/// Non-object payloads are serialized as-is.
///
/// # Errors
///
/// Returns [`TrustError::SerializationError`](crate::TrustError::SerializationError)
/// if serialization fails.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use ucp_trust::jose::canonical_json;
///
/// let payload = json!({"z": 1, "a": {"y": "https://x/ü", "b": 2}, "sig": "..."});
/// let canonical = canonical_json(&payload, "sig").unwrap();
/// assert_eq!(canonical, r#"{"a":{"b":2,"y":"https://x/ü"},"z":1}"#);
/// ```
pub fn canonical_json(payload: &Value, excluded: &str) -> Result<String> {
    let mut stripped = payload.clone();
    if let Value::Object(map) = &mut stripped {
        map.remove(excluded);
    }
    Ok(serde_json::to_string(&sort_keys(&stripped))?)
}
