//! Baseline Job construction from a user description

use kbatch_common::k8s::{
    Container, EnvVar, Job, JobSpec, ObjectMeta, PodSpec, PodTemplateSpec, ResourceRequirements,
    RestartPolicy,
};

use crate::description::JobDescription;

/// Name of the application container in every built job
pub const JOB_CONTAINER_NAME: &str = "job";

/// Retries before a failed job stops creating pods
pub const DEFAULT_BACKOFF_LIMIT: i32 = 4;

/// Seconds a finished job is kept before the cluster deletes it
pub const DEFAULT_TTL_SECONDS_AFTER_FINISHED: i32 = 300;

/// Build the baseline Job manifest for a description.
///
/// The result has no namespace, labels, or annotations; those depend on the
/// submitting user and are applied by [`crate::patch::patch`].
pub fn build_job(desc: &JobDescription) -> Job {
    let env = desc
        .env
        .iter()
        .map(|(name, value)| EnvVar::literal(name, value))
        .collect();

    let container = Container {
        name: JOB_CONTAINER_NAME.to_string(),
        image: Some(desc.image.clone()),
        command: desc.command.clone(),
        args: desc.args.clone(),
        env,
        resources: Some(ResourceRequirements::default()),
        ..Default::default()
    };

    let template = PodTemplateSpec {
        metadata: ObjectMeta {
            name: Some(format!("{}-pod", desc.name)),
            ..Default::default()
        },
        spec: PodSpec {
            containers: vec![container],
            restart_policy: Some(RestartPolicy::Never),
            tolerations: desc.tolerations.clone(),
            ..Default::default()
        },
        ..Default::default()
    };

    Job::new(
        ObjectMeta::generated(generate_name(&desc.name)),
        JobSpec {
            template,
            backoff_limit: Some(DEFAULT_BACKOFF_LIMIT),
            ttl_seconds_after_finished: Some(DEFAULT_TTL_SECONDS_AFTER_FINISHED),
            ..Default::default()
        },
    )
}

/// Generated-name prefix for a job name; always ends in `-`
fn generate_name(name: &str) -> String {
    if name.ends_with('-') {
        name.to_string()
    } else {
        format!("{name}-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> JobDescription {
        JobDescription {
            args: Some(vec!["ls".to_string(), "-lh".to_string()]),
            env: [("MYENV".to_string(), "MYVALUE".to_string())].into(),
            ..JobDescription::new("job1", "alpine")
        }
    }

    #[test]
    fn single_container_with_fixed_name() {
        let job = build_job(&description());
        let containers = &job.pod_spec().containers;
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, JOB_CONTAINER_NAME);
        assert_eq!(containers[0].image.as_deref(), Some("alpine"));
        assert_eq!(
            containers[0].args,
            Some(vec!["ls".to_string(), "-lh".to_string()])
        );
        assert!(containers[0].command.is_none());
        assert_eq!(containers[0].env, vec![EnvVar::literal("MYENV", "MYVALUE")]);
    }

    #[test]
    fn generate_name_gets_trailing_separator() {
        assert_eq!(build_job(&description()).metadata.generate_name.as_deref(), Some("job1-"));

        let desc = JobDescription::new("job1-", "alpine");
        assert_eq!(build_job(&desc).metadata.generate_name.as_deref(), Some("job1-"));
    }

    #[test]
    fn no_env_means_no_env_field() {
        let job = build_job(&JobDescription::new("job1", "alpine"));
        assert!(job.pod_spec().containers[0].env.is_empty());

        let value = serde_json::to_value(&job).unwrap();
        assert!(value["spec"]["template"]["spec"]["containers"][0]
            .get("env")
            .is_none());
    }

    #[test]
    fn batch_defaults() {
        let job = build_job(&description());
        assert_eq!(job.api_version, "batch/v1");
        assert_eq!(job.kind, "Job");
        assert_eq!(job.spec.backoff_limit, Some(4));
        assert_eq!(job.spec.ttl_seconds_after_finished, Some(300));
        assert_eq!(job.pod_spec().restart_policy, Some(RestartPolicy::Never));
    }

    #[test]
    fn labels_and_namespace_start_empty() {
        let job = build_job(&description());
        assert!(job.metadata.labels.is_empty());
        assert!(job.metadata.annotations.is_empty());
        assert!(job.metadata.namespace.is_none());
        assert!(job.spec.template.metadata.labels.is_empty());
        assert!(job.spec.template.metadata.namespace.is_none());
        assert_eq!(job.spec.template.metadata.name.as_deref(), Some("job1-pod"));
    }

    #[test]
    fn tolerations_carried_to_pod_spec() {
        let mut desc = description();
        desc.tolerations = vec![crate::parse_toleration("dedicated=batch:NoSchedule").unwrap()];
        let job = build_job(&desc);
        assert_eq!(job.pod_spec().tolerations, desc.tolerations);
    }
}
