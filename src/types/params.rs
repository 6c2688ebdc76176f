//! Parameter bags and JSON helpers shared by the engine.
//!
//! Parameters and responses are plain `serde_json` values. `serde_json::Map`
//! is ordered by key, so serializing a bag gives a canonical identity for it.

use serde_json::{Map, Value};

/// Caller-supplied parameters, keyed by parameter name.
pub type ParamBag = Map<String, Value>;

/// One fully materialized set of parameters for a single remote call.
///
/// Always an independent clone; sibling sets never share values.
pub type ParamSet = Map<String, Value>;

/// Look up a value by dotted path.
///
/// Path segments are object keys or array indices: `Reservations.0.Instances`
/// and `Reservations[0].Instances` address the same value. An empty path
/// returns the value itself.
///
/// # Example
///
/// ```
/// # use record_collector::types::params::lookup_path;
/// # use serde_json::json;
/// let response = json!({"Page": {"Items": [{"Id": "a"}]}});
/// assert_eq!(lookup_path(&response, "Page.Items[0].Id"), Some(&json!("a")));
/// assert_eq!(lookup_path(&response, "Page.Missing"), None);
/// ```
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let normalized = path.replace('[', ".").replace(']', "");
    normalized
        .split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// JavaScript-style truthiness, used for pagination indicators.
///
/// `null`, `false`, `0`, `""` are falsy. Every array and object is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Recursively merge `source` into `target`.
///
/// Objects merge key by key; any other value in `source` replaces the one
/// in `target`. `null` in `source` leaves `target` untouched.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (target, source) => *target = source.clone(),
    }
}

/// Canonical, order-independent rendering of a bag, used for identity and diagnostics.
pub fn canonical(params: &ParamBag) -> String {
    serde_json::to_string(params).unwrap_or_else(|_| "{}".to_string())
}
