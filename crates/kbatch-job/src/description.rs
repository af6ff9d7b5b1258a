//! User-authored job descriptions

use std::collections::BTreeMap;

use kbatch_common::k8s::Toleration;
use serde::{Deserialize, Deserializer};

use crate::toleration::parse_toleration;

/// A batch job as described by a user.
///
/// This is the minimal input the builder expands into a full manifest.
/// Tolerations are written either as `key=value:effect` strings or as
/// Kubernetes toleration objects. Strings are parsed while the description is
/// deserialized, so an invalid one rejects the whole description before any
/// manifest exists.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JobDescription {
    /// Job name, used as the generated-name prefix
    pub name: String,
    /// Container image
    pub image: String,
    /// Entrypoint override
    #[serde(default)]
    pub command: Option<Vec<String>>,
    /// Arguments
    #[serde(default)]
    pub args: Option<Vec<String>>,
    /// Environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Tolerations for the job's pods
    #[serde(default, deserialize_with = "deserialize_tolerations")]
    pub tolerations: Vec<Toleration>,
}

impl JobDescription {
    /// Create a description with only a name and image
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }
}

/// A toleration as written in a description
#[derive(Deserialize)]
#[serde(untagged)]
enum TolerationEntry {
    Short(String),
    Full(Toleration),
}

fn deserialize_tolerations<'de, D>(deserializer: D) -> Result<Vec<Toleration>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<TolerationEntry>>::deserialize(deserializer)?.unwrap_or_default();
    entries
        .into_iter()
        .map(|entry| match entry {
            TolerationEntry::Short(s) => parse_toleration(&s).map_err(serde::de::Error::custom),
            TolerationEntry::Full(t) => Ok(t),
        })
        .collect()
}
