//! YAML helpers
//!
//! Job descriptions and cluster job templates are authored as YAML. They are
//! read into `serde_json::Value` so every input, YAML or JSON, goes through the
//! same strict typed parsing afterwards.

use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// Parse a YAML (or JSON) document into a `serde_json::Value`.
///
/// Returns `Value::Null` for empty input.
pub fn parse_yaml(input: &str) -> Result<Value> {
    if input.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_yaml::from_str(input)?)
}

/// Render any serializable object as YAML
pub fn to_yaml<T: Serialize>(value: &T) -> Result<String> {
    serde_yaml::to_string(value).map_err(Error::from)
}
