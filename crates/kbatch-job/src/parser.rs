//! Strict parsing of untyped manifests into typed objects
//!
//! Input arrives as a JSON-shaped `serde_json::Value`. A Job is first checked
//! against the complete batch/v1 schema from `k8s-openapi`: its deserializer
//! catches wrong types and missing required fields, and any key it does not
//! write back out is unknown to Kubernetes. Parsing fails fast on the first
//! mismatch and reports its path.
//!
//! `null` is how an absent field arrives from many clients, so nulls are
//! treated as absent throughout.

use k8s_openapi::api::batch::v1::Job as JobSchema;
use kbatch_common::k8s::{Job, JOB_API_VERSION, JOB_KIND};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::description::JobDescription;
use crate::error::JobError;

/// Keys whose values map resource names to quantities
const QUANTITY_MAP_KEYS: &[&str] = &["requests", "limits", "overhead"];

/// Keys holding a single quantity
const QUANTITY_KEYS: &[&str] = &["sizeLimit"];

/// Parse an untyped value into `T`, reporting the first mismatching field.
pub fn parse<T: DeserializeOwned>(value: Value) -> Result<T, JobError> {
    serde_path_to_error::deserialize(value).map_err(|e| JobError::SchemaMismatch {
        path: e.path().to_string(),
        message: e.inner().to_string(),
    })
}

/// Serialize a typed object into its untyped wire form
pub fn serialize<T: Serialize>(object: &T) -> Result<Value, JobError> {
    serde_json::to_value(object)
        .map_err(|e| JobError::Common(kbatch_common::Error::serialization(e.to_string())))
}

/// Parse a batch/v1 Job, rejecting anything outside the Kubernetes schema
pub fn parse_job(mut value: Value) -> Result<Job, JobError> {
    normalize_quantities(&mut value);
    validate_schema::<JobSchema>(&value)?;
    strip_nulls(&mut value);

    let job: Job = parse(value)?;
    check_type(&job.api_version, &job.kind, JOB_API_VERSION, JOB_KIND)?;
    Ok(job)
}

/// Parse a user job description
pub fn parse_description(value: Value) -> Result<JobDescription, JobError> {
    parse(value)
}

/// Check `value` against the schema type `S`.
fn validate_schema<S: DeserializeOwned + Serialize>(value: &Value) -> Result<(), JobError> {
    let typed: S = parse(value.clone())?;
    let known = serialize(&typed)?;
    reject_unknown_fields(value, &known, "")
}

/// Find the first non-null key of `input` missing from `known`, the schema
/// type's own serialization of the same input.
fn reject_unknown_fields(input: &Value, known: &Value, path: &str) -> Result<(), JobError> {
    match (input, known) {
        (Value::Object(fields), Value::Object(known_fields)) => {
            for (key, field) in fields.iter().filter(|(_, v)| !v.is_null()) {
                let field_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                let Some(known_field) = known_fields.get(key) else {
                    return Err(JobError::SchemaMismatch {
                        path: field_path,
                        message: format!("unknown field `{key}`"),
                    });
                };
                reject_unknown_fields(field, known_field, &field_path)?;
            }
            Ok(())
        }
        (Value::Array(items), Value::Array(known_items)) => {
            for (i, (item, known_item)) in items.iter().zip(known_items).enumerate() {
                reject_unknown_fields(item, known_item, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Rewrite numeric quantities (`cpu: 1`) in their string form
fn normalize_quantities(value: &mut Value) {
    match value {
        Value::Object(fields) => {
            for (key, field) in fields.iter_mut() {
                if QUANTITY_KEYS.contains(&key.as_str()) {
                    stringify_number(field);
                } else if QUANTITY_MAP_KEYS.contains(&key.as_str()) {
                    if let Value::Object(quantities) = field {
                        quantities.values_mut().for_each(stringify_number);
                    }
                }
                normalize_quantities(field);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_quantities),
        _ => {}
    }
}

fn stringify_number(value: &mut Value) {
    if let Value::Number(n) = value {
        *value = Value::String(n.to_string());
    }
}

fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(fields) => {
            fields.retain(|_, v| !v.is_null());
            fields.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

fn check_type(
    api_version: &str,
    kind: &str,
    expected_api_version: &str,
    expected_kind: &str,
) -> Result<(), JobError> {
    if api_version != expected_api_version {
        return Err(JobError::SchemaMismatch {
            path: "apiVersion".to_string(),
            message: format!("expected '{expected_api_version}', got '{api_version}'"),
        });
    }
    if kind != expected_kind {
        return Err(JobError::SchemaMismatch {
            path: "kind".to_string(),
            message: format!("expected '{expected_kind}', got '{kind}'"),
        });
    }
    Ok(())
}
