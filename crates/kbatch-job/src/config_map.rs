//! Companion ConfigMap carrying a job's code payload

use base64::{engine::general_purpose::STANDARD, Engine};
use kbatch_common::k8s::{
    ConfigMap, Job, ObjectMeta, OwnerReference, JOB_API_VERSION, JOB_KIND,
};

use crate::error::JobError;
use crate::patch::CODE_CONFIG_MAP_KEY;

/// Set the namespace of a ConfigMap. Last write wins.
pub fn set_namespace(config_map: &mut ConfigMap, namespace: &str) {
    config_map.metadata.namespace = Some(namespace.to_string());
}

/// Build the ConfigMap holding a job's zipped code.
///
/// It shares the job's generated-name prefix, namespace, and labels. The
/// cluster assigns the final name on creation.
pub fn build_code_config_map(job: &Job, payload: &[u8]) -> ConfigMap {
    let mut cm = ConfigMap::new(ObjectMeta {
        generate_name: Some(job.metadata.display_name().to_string()),
        namespace: job.metadata.namespace.clone(),
        labels: job.metadata.labels.clone(),
        ..Default::default()
    });
    cm.binary_data
        .insert(CODE_CONFIG_MAP_KEY.to_string(), STANDARD.encode(payload));
    cm
}

/// Make a created Job the owner of its ConfigMap, so the cluster deletes the
/// ConfigMap along with the Job.
pub fn set_owner_reference(config_map: &mut ConfigMap, job: &Job) -> Result<(), JobError> {
    const STEP: &str = "set_owner_reference";

    let (Some(name), Some(uid)) = (job.metadata.name.as_deref(), job.metadata.uid.as_deref())
    else {
        return Err(JobError::malformed(
            STEP,
            "job has no server-assigned name and uid",
        ));
    };

    config_map
        .metadata
        .owner_references
        .retain(|r| !(r.kind == JOB_KIND && r.uid == uid));
    config_map.metadata.owner_references.push(OwnerReference {
        api_version: JOB_API_VERSION.to_string(),
        kind: JOB_KIND.to_string(),
        name: name.to_string(),
        uid: uid.to_string(),
        controller: None,
        block_owner_deletion: None,
    });
    Ok(())
}
