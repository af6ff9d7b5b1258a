//! Toleration parsing for `key=value:effect` strings

use kbatch_common::k8s::Toleration;

use crate::error::JobError;

/// Parse a toleration written as `<key>=<value>:<effect>`.
///
/// The string must contain exactly one `=` and exactly one `:`, with the `=`
/// before the `:`. The resulting toleration uses the `Equal` operator.
pub fn parse_toleration(s: &str) -> Result<Toleration, JobError> {
    let invalid = || JobError::InvalidToleration {
        value: s.to_string(),
    };

    if s.matches('=').count() != 1 || s.matches(':').count() != 1 {
        return Err(invalid());
    }
    let (key, rest) = s.split_once('=').ok_or_else(invalid)?;
    let (value, effect) = rest.split_once(':').ok_or_else(invalid)?;

    Ok(Toleration {
        key: Some(key.to_string()),
        operator: Some("Equal".to_string()),
        value: Some(value.to_string()),
        effect: Some(effect.to_string()),
        toleration_seconds: None,
    })
}
