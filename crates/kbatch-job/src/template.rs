//! Merging cluster job templates with user jobs
//!
//! Administrators can supply a partial Job (tolerations, node selectors,
//! resource limits, ...) that is merged under every user job before parsing.

use serde_json::{Map, Value};

/// Deep-merge `overlay` onto `base`.
///
/// - objects merge key by key, recursively
/// - arrays concatenate, except that objects with the same `name` field merge
///   in place (so a template's `job` container and the user's combine)
/// - `null` in the overlay keeps the base value
/// - any other overlay value replaces the base value
pub fn merge_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (base, Value::Null) => base,
        (Value::Object(base), Value::Object(overlay)) => Value::Object(merge_objects(base, overlay)),
        (Value::Array(base), Value::Array(overlay)) => Value::Array(merge_arrays(base, overlay)),
        (_, overlay) => overlay,
    }
}

/// Apply a job template under a user job. The user's values take precedence.
pub fn apply_template(template: &Value, job: Value) -> Value {
    merge_values(template.clone(), job)
}

fn merge_objects(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in overlay {
        let merged = match base.remove(&key) {
            Some(existing) => merge_values(existing, value),
            None => value,
        };
        base.insert(key, merged);
    }
    base
}

fn merge_arrays(mut base: Vec<Value>, overlay: Vec<Value>) -> Vec<Value> {
    for item in overlay {
        let position = item_name(&item)
            .and_then(|name| base.iter().position(|b| item_name(b) == Some(name)));
        match position {
            Some(i) => {
                let existing = std::mem::take(&mut base[i]);
                base[i] = merge_values(existing, item);
            }
            None => base.push(item),
        }
    }
    base
}

fn item_name(value: &Value) -> Option<&str> {
    value.get("name").and_then(Value::as_str)
}
