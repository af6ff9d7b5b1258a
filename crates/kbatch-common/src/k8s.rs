//! Kubernetes object model for batch jobs
//!
//! Typed views of the batch/v1 Job and core/v1 ConfigMap schemas. Fields that
//! kbatch reads or writes are named; every other schema field lands in the
//! struct's `extra` map and is written back unchanged, so a manifest survives
//! a parse/serialize round trip. Checking a manifest against the full schema
//! is the parser's job, not the model's.
//!
//! Lists and maps that Kubernetes treats as optional (`initContainers`,
//! `volumes`, `env`, `labels`, ...) are plain collections: absent, `null`,
//! and empty all parse to the same value, and an empty one is never
//! serialized.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// API version of batch Jobs
pub const JOB_API_VERSION: &str = "batch/v1";
/// Kind of batch Jobs
pub const JOB_KIND: &str = "Job";
/// API version of ConfigMaps
pub const CONFIG_MAP_API_VERSION: &str = "v1";
/// Kind of ConfigMaps
pub const CONFIG_MAP_KIND: &str = "ConfigMap";

/// Schema fields a typed struct does not name, keyed by wire name
pub type ExtraFields = BTreeMap<String, Value>;

/// Deserialize an optional collection, treating `null` as empty
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Metadata
// =============================================================================

/// Object metadata shared by Jobs, pod templates and ConfigMaps
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name (assigned by the server when `generate_name` is used)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name prefix; the server appends a unique suffix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    /// Namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Labels
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub annotations: BTreeMap<String, String>,
    /// Server-assigned UID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Owners of this object, used for cascading deletion
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub owner_references: Vec<OwnerReference>,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ObjectMeta {
    /// Metadata with only a generated-name prefix set
    pub fn generated(prefix: impl Into<String>) -> Self {
        Self {
            generate_name: Some(prefix.into()),
            ..Default::default()
        }
    }

    /// Name if assigned, otherwise the generate-name prefix
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.generate_name.as_deref())
            .unwrap_or_default()
    }
}

/// Reference from a dependent object to its owner
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OwnerReference {
    /// Owner API version
    pub api_version: String,
    /// Owner kind
    pub kind: String,
    /// Owner name
    pub name: String,
    /// Owner UID
    pub uid: String,
    /// Whether the owner is the managing controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    /// Block owner deletion until this dependent is removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_owner_deletion: Option<bool>,
}

// =============================================================================
// Job
// =============================================================================

/// Kubernetes batch/v1 Job
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: ObjectMeta,
    /// Job spec
    pub spec: JobSpec,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Job {
    /// Create a Job around a pod template
    pub fn new(metadata: ObjectMeta, spec: JobSpec) -> Self {
        Self {
            api_version: JOB_API_VERSION.to_string(),
            kind: JOB_KIND.to_string(),
            metadata,
            spec,
            extra: ExtraFields::new(),
        }
    }

    /// Pod spec of the job template
    pub fn pod_spec(&self) -> &PodSpec {
        &self.spec.template.spec
    }

    /// Mutable pod spec of the job template
    pub fn pod_spec_mut(&mut self) -> &mut PodSpec {
        &mut self.spec.template.spec
    }
}

/// Job spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// Pod template
    pub template: PodTemplateSpec,
    /// Retries before the job is marked failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_limit: Option<i32>,
    /// Seconds after completion before the job is garbage-collected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_finished: Option<i32>,
    /// Wall-clock limit for the whole job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_deadline_seconds: Option<i64>,
    /// Pods running at once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<i32>,
    /// Successful pods required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completions: Option<i32>,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

// =============================================================================
// Pod
// =============================================================================

/// Pod template
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateSpec {
    /// Pod metadata
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: ObjectMeta,
    /// Pod spec
    pub spec: PodSpec,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Pod restart policy
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Failed attempts produce a new pod
    #[default]
    Never,
    /// Restart the container in place on failure
    OnFailure,
    /// Always restart
    Always,
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => write!(f, "Never"),
            Self::OnFailure => write!(f, "OnFailure"),
            Self::Always => write!(f, "Always"),
        }
    }
}

/// Pod spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Application containers
    pub containers: Vec<Container>,
    /// Containers run to completion, in order, before `containers` start
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub init_containers: Vec<Container>,
    /// Volumes
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub volumes: Vec<Volume>,
    /// Restart policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
    /// Tolerations
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tolerations: Vec<Toleration>,
    /// Node selector
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub node_selector: BTreeMap<String, String>,
    /// Service account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

// =============================================================================
// Container
// =============================================================================

/// Container spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name
    pub name: String,
    /// Image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Args
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Environment variables
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub env: Vec<EnvVar>,
    /// Volume mounts
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub volume_mounts: Vec<VolumeMount>,
    /// Resource requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Environment variable
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvVar {
    /// Variable name
    pub name: String,
    /// Literal value (mutually exclusive with `value_from`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Value read from a Secret or ConfigMap key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<EnvVarSource>,
}

impl EnvVar {
    /// Create an env var with a literal value
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        }
    }
}

/// Source for an environment variable value
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSource {
    /// Key in a Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<KeySelector>,
    /// Key in a ConfigMap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_key_ref: Option<KeySelector>,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Selector for a key within a Secret or ConfigMap
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeySelector {
    /// Object name
    pub name: String,
    /// Key within the object
    pub key: String,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Resource requests and limits, keyed by resource name (`cpu`, `memory`, ...)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    /// Requests
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub requests: BTreeMap<String, Quantity>,
    /// Limits
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub limits: BTreeMap<String, Quantity>,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Resource quantity such as `500m`, `4Gi` or `2`.
///
/// Manifests written by hand often give plain numbers (`cpu: 1`); those are
/// accepted and kept in their canonical string form.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Quantity(pub String);

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        match Raw::deserialize(deserializer) {
            Ok(Raw::Text(s)) => Ok(Self(s)),
            Ok(Raw::Number(n)) => Ok(Self(n.to_string())),
            Err(_) => Err(serde::de::Error::custom(
                "invalid quantity: expected a string or a number",
            )),
        }
    }
}

impl From<&str> for Quantity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Volumes
// =============================================================================

/// Volume
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name
    pub name: String,
    /// ConfigMap source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapVolumeSource>,
    /// EmptyDir source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDirVolumeSource>,
    /// Secret source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,
    /// PVC source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PvcVolumeSource>,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Binding state of a ConfigMap-backed volume
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigMapBinding<'a> {
    /// The ConfigMap has not been created yet, so its name is unknown
    Pending,
    /// Bound to the named ConfigMap
    Bound(&'a str),
}

impl Volume {
    fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_map: None,
            empty_dir: None,
            secret: None,
            persistent_volume_claim: None,
            extra: ExtraFields::new(),
        }
    }

    /// Create a Volume backed by an emptyDir.
    pub fn from_empty_dir(name: impl Into<String>) -> Self {
        Self {
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Self::empty(name)
        }
    }

    /// Create a ConfigMap-backed Volume whose ConfigMap does not exist yet.
    pub fn pending_config_map(name: impl Into<String>) -> Self {
        Self {
            config_map: Some(ConfigMapVolumeSource::default()),
            ..Self::empty(name)
        }
    }

    /// Binding state, or `None` if this volume is not backed by a ConfigMap
    pub fn config_map_binding(&self) -> Option<ConfigMapBinding<'_>> {
        self.config_map
            .as_ref()
            .map(|cm| match cm.name.as_deref() {
                Some(name) if !name.is_empty() => ConfigMapBinding::Bound(name),
                _ => ConfigMapBinding::Pending,
            })
    }
}

/// ConfigMap volume source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapVolumeSource {
    /// ConfigMap name; absent until the ConfigMap has been created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// File mode bits for projected keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<i32>,
    /// Tolerate a missing ConfigMap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// EmptyDir volume source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EmptyDirVolumeSource {
    /// Storage medium ("Memory" for tmpfs, empty for default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    /// Size limit (e.g. "1Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_limit: Option<Quantity>,
}

/// Secret volume source
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    /// Secret name
    pub secret_name: String,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// PVC volume source
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PvcVolumeSource {
    /// PVC claim name
    pub claim_name: String,
    /// Read only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

/// Volume mount
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    /// Volume name
    pub name: String,
    /// Mount path
    pub mount_path: String,
    /// Sub path within the volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
    /// Read only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl VolumeMount {
    /// Mount a volume at a path
    pub fn new(name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            sub_path: None,
            read_only: None,
            extra: ExtraFields::new(),
        }
    }
}

// =============================================================================
// Scheduling
// =============================================================================

/// Kubernetes toleration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Toleration {
    /// Taint key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// `Equal` or `Exists`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Taint value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Taint effect (`NoSchedule`, `PreferNoSchedule`, `NoExecute`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    /// How long a `NoExecute` taint is tolerated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

// =============================================================================
// ConfigMap
// =============================================================================

/// Kubernetes ConfigMap
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: ObjectMeta,
    /// String data
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub data: BTreeMap<String, String>,
    /// Binary data, base64-encoded
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub binary_data: BTreeMap<String, String>,
    /// Other schema fields, carried through unchanged
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ConfigMap {
    /// Create a ConfigMap with the given metadata and no data
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            api_version: CONFIG_MAP_API_VERSION.to_string(),
            kind: CONFIG_MAP_KIND.to_string(),
            metadata,
            data: BTreeMap::new(),
            binary_data: BTreeMap::new(),
            extra: ExtraFields::new(),
        }
    }
}

impl Default for ConfigMap {
    fn default() -> Self {
        Self::new(ObjectMeta::default())
    }
}
