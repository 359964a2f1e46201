use serde_json::{Map, Value};

/// Marker substituted for any value whose key matched a redact substring.
pub const REDACTION_MARKER: &str = "***REDACTED***";

/// Recursively mask sensitive values in a caller-supplied context map.
///
/// A value is replaced with [`REDACTION_MARKER`] when its key, lower-cased,
/// contains any entry of `redact_keys` as a substring. Nested maps are
/// descended into; the key of a nested map itself never triggers masking,
/// only leaf values do. Returns a new map, the input is not mutated.
pub fn redact_map(data: &Map<String, Value>, redact_keys: &[String]) -> Map<String, Value> {
    let mut out = Map::with_capacity(data.len());
    for (key, value) in data {
        match value {
            Value::Object(inner) => {
                out.insert(key.clone(), Value::Object(redact_map(inner, redact_keys)));
            }
            _ => {
                let lower = key.to_lowercase();
                if redact_keys.iter().any(|needle| lower.contains(needle.as_str())) {
                    out.insert(key.clone(), Value::String(REDACTION_MARKER.to_string()));
                } else {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
    }
    out
}
