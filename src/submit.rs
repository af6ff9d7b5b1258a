//! Submission pipeline
//!
//! [`prepare_job`] is the pure part: template merge, strict parse, per-user
//! patching, and code bootstrap injection. [`submit_job`] performs the
//! order-dependent cluster calls: the code ConfigMap must exist before the
//! Job that mounts it, and its name is only known once it has been created.

use std::path::Path;

use kbatch_common::k8s::{ConfigMap, Job};
use kbatch_common::{LABEL_MANAGED_BY, LABEL_MANAGED_BY_KBATCH, LABEL_USER};
use kbatch_job::{
    add_bootstrap_init_container_with, add_extra_env, apply_template, bind_config_map_volume,
    build_code_config_map, build_job, ensure_bound, parse_description, parse_job, patch,
    serialize, set_owner_reference, User,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::cluster::ClusterApi;
use crate::config::JobSettings;
use crate::{Error, Result};

/// Longest namespace the apiserver accepts; also the label value limit
pub const MAX_NAMESPACE_LEN: usize = 63;

/// Objects created for one submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedJob {
    /// The created Job, with its server-assigned name
    pub job: Job,
    /// The created code ConfigMap, if code was uploaded
    pub config_map: Option<ConfigMap>,
}

/// Read a job file (YAML or JSON) into its untyped manifest form.
///
/// With `is_manifest` the file holds a full batch/v1 Job; otherwise it holds
/// a job description, which is built into a baseline manifest.
pub fn load_job_value(path: &Path, is_manifest: bool) -> Result<Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let value = kbatch_common::yaml::parse_yaml(&raw)?;
    if is_manifest {
        return Ok(value);
    }
    let description = parse_description(value)?;
    Ok(serialize(&build_job(&description))?)
}

/// Turn an untyped job into the sandboxed manifest for `user`.
///
/// With `with_code` the code bootstrap is injected; the resulting job must
/// then be submitted with a code payload.
pub fn prepare_job(
    settings: &JobSettings,
    user: &User,
    job: Value,
    with_code: bool,
) -> Result<Job> {
    let job = match &settings.job_template {
        Some(template) => apply_template(template, job),
        None => job,
    };
    let mut job = parse_job(job)?;

    let namespace = user.namespace();
    validate_namespace(&user.name, &namespace)?;
    let mut labels = settings.labels.clone();
    labels.insert(LABEL_USER.to_string(), namespace.clone());
    labels.insert(
        LABEL_MANAGED_BY.to_string(),
        LABEL_MANAGED_BY_KBATCH.to_string(),
    );

    patch(&mut job, None, &settings.annotations, &labels, &user.name);
    add_extra_env(&mut job, &settings.extra_env);
    if with_code {
        add_bootstrap_init_container_with(&mut job, &settings.bootstrap)?;
    }

    info!(
        job = %job.metadata.display_name(),
        namespace = %namespace,
        with_code,
        "prepared job"
    );
    Ok(job)
}

/// Check a derived namespace is a DNS-1123 label. It doubles as the user
/// label value, which has the same limits.
fn validate_namespace(identity: &str, namespace: &str) -> Result<()> {
    let invalid = |reason: String| {
        Err(Error::validation(format!(
            "user '{identity}' maps to unusable namespace '{namespace}': {reason}"
        )))
    };

    if namespace.is_empty() {
        return invalid("namespace is empty".to_string());
    }
    let len = namespace.chars().count();
    if len > MAX_NAMESPACE_LEN {
        return invalid(format!(
            "{len} characters, at most {MAX_NAMESPACE_LEN} allowed"
        ));
    }
    if namespace.starts_with('-') || namespace.ends_with('-') {
        return invalid("must start and end with a letter or digit".to_string());
    }
    Ok(())
}

/// Submit a prepared job, creating its code ConfigMap first when `code` is given.
pub async fn submit_job<C: ClusterApi + ?Sized>(
    api: &C,
    mut job: Job,
    code: Option<&[u8]>,
) -> Result<SubmittedJob> {
    let namespace = job
        .metadata
        .namespace
        .clone()
        .ok_or_else(|| Error::validation("job has not been assigned a namespace"))?;

    api.ensure_namespace(&namespace).await?;

    let config_map = match code {
        Some(payload) => {
            let created = api
                .create_config_map(&build_code_config_map(&job, payload))
                .await?;
            bind_config_map_volume(&mut job, &created)?;
            Some(created)
        }
        None => None,
    };

    ensure_bound(&job)?;
    let job = api.create_job(&job).await?;

    let config_map = match config_map {
        Some(mut cm) => {
            set_owner_reference(&mut cm, &job)?;
            if let Err(e) = api.set_config_map_owners(&cm).await {
                // The job is already running; the ConfigMap just outlives it
                warn!(
                    config_map = %cm.metadata.display_name(),
                    error = %e,
                    "failed to set config map owner"
                );
            }
            Some(cm)
        }
        None => None,
    };

    info!(job = %job.metadata.display_name(), namespace = %namespace, "submitted job");
    Ok(SubmittedJob { job, config_map })
}
