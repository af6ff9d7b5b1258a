//! Patch engine: per-user sandboxing of a built or parsed Job
//!
//! Steps run in a fixed order on a manifest owned by a single request:
//! 1. [`patch`] sets the user's namespace and merges labels/annotations
//! 2. [`add_bootstrap_init_container`] injects the code-staging init container
//!    and its volumes, with the code ConfigMap volume left pending
//! 3. [`bind_config_map_volume`] binds that volume once the ConfigMap exists
//!
//! [`ensure_bound`] guards submission against a volume left pending.

use std::collections::BTreeMap;

use kbatch_common::k8s::{
    ConfigMap, ConfigMapBinding, Container, EnvVar, Job, ObjectMeta, Volume, VolumeMount,
};
use tracing::{debug, error};

use crate::config_map::set_namespace;
use crate::error::JobError;
use crate::namespace::namespace_for_identity;

/// Name of the injected init container
pub const INIT_CONTAINER_NAME: &str = "kbatch-init";

/// Volume holding the unpacked user code, shared with the application container
pub const CODE_VOLUME_NAME: &str = "kbatch-code";

/// Volume projecting the code ConfigMap into the init container
pub const CODE_ZIPPED_VOLUME_NAME: &str = "kbatch-code-zipped";

/// Where user code is unpacked
pub const CODE_MOUNT_PATH: &str = "/code";

/// Where the zipped payload is projected
pub const CODE_ZIPPED_MOUNT_PATH: &str = "/code-zipped";

/// ConfigMap key holding the zipped payload
pub const CODE_CONFIG_MAP_KEY: &str = "code";

/// Default image for the init container; needs `unzip`
pub const DEFAULT_INIT_IMAGE: &str = "busybox:1.36";

/// Settings for the injected init container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Image providing `unzip`
    pub image: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_INIT_IMAGE.to_string(),
        }
    }
}

/// Place a job (and optionally its ConfigMap) in the user's namespace and
/// merge the given annotations and labels into the job and pod metadata.
///
/// Supplied keys overwrite existing ones; other existing keys are kept.
pub fn patch(
    job: &mut Job,
    config_map: Option<&mut ConfigMap>,
    annotations: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
    identity: &str,
) {
    let namespace = namespace_for_identity(identity);
    debug!(job = %job.metadata.display_name(), namespace = %namespace, "patching job");

    for meta in [&mut job.metadata, &mut job.spec.template.metadata] {
        apply_metadata(meta, &namespace, annotations, labels);
    }

    if let Some(cm) = config_map {
        set_namespace(cm, &namespace);
    }
}

fn apply_metadata(
    meta: &mut ObjectMeta,
    namespace: &str,
    annotations: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
) {
    meta.namespace = Some(namespace.to_string());
    meta.annotations
        .extend(annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
    meta.labels
        .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
}

/// Inject the code-staging init container with the default image.
pub fn add_bootstrap_init_container(job: &mut Job) -> Result<(), JobError> {
    add_bootstrap_init_container_with(job, &BootstrapConfig::default())
}

/// Inject the init container that unpacks user code before the job starts.
///
/// Appends one init container, then two volumes: the pending code ConfigMap
/// volume followed by the empty-dir code volume. The primary container gets a
/// mount of the code volume and runs from it. Existing init containers,
/// volumes, and mounts are preserved.
pub fn add_bootstrap_init_container_with(
    job: &mut Job,
    config: &BootstrapConfig,
) -> Result<(), JobError> {
    const STEP: &str = "add_bootstrap_init_container";

    let name = job.metadata.display_name().to_string();
    let spec = job.pod_spec_mut();
    let Some(primary) = spec.containers.first_mut() else {
        error!(job = %name, step = STEP, "pod spec has no containers");
        return Err(JobError::malformed(STEP, "pod spec has no containers"));
    };

    primary
        .volume_mounts
        .push(VolumeMount::new(CODE_VOLUME_NAME, CODE_MOUNT_PATH));
    primary.working_dir = Some(CODE_MOUNT_PATH.to_string());

    spec.init_containers.push(Container {
        name: INIT_CONTAINER_NAME.to_string(),
        image: Some(config.image.clone()),
        command: Some(vec!["unzip".to_string()]),
        args: Some(vec![
            "-o".to_string(),
            format!("{CODE_ZIPPED_MOUNT_PATH}/{CODE_CONFIG_MAP_KEY}"),
            "-d".to_string(),
            CODE_MOUNT_PATH.to_string(),
        ]),
        volume_mounts: vec![
            VolumeMount::new(CODE_ZIPPED_VOLUME_NAME, CODE_ZIPPED_MOUNT_PATH),
            VolumeMount::new(CODE_VOLUME_NAME, CODE_MOUNT_PATH),
        ],
        ..Default::default()
    });

    spec.volumes
        .push(Volume::pending_config_map(CODE_ZIPPED_VOLUME_NAME));
    spec.volumes.push(Volume::from_empty_dir(CODE_VOLUME_NAME));

    debug!(
        job = %name,
        init_containers = spec.init_containers.len(),
        volumes = spec.volumes.len(),
        "injected bootstrap init container"
    );
    Ok(())
}

/// Bind the pending code volume to a created ConfigMap.
///
/// `config_map` must carry its server-assigned name. Binding happens once; a
/// volume already bound is an error.
pub fn bind_config_map_volume(job: &mut Job, config_map: &ConfigMap) -> Result<(), JobError> {
    const STEP: &str = "bind_config_map_volume";

    let name = job.metadata.display_name().to_string();
    let Some(cm_name) = config_map.metadata.name.as_deref().filter(|n| !n.is_empty()) else {
        error!(job = %name, step = STEP, "config map has no server-assigned name");
        return Err(JobError::malformed(
            STEP,
            "config map has no server-assigned name",
        ));
    };

    let volume = job
        .pod_spec_mut()
        .volumes
        .iter_mut()
        .find(|v| v.name == CODE_ZIPPED_VOLUME_NAME);

    let source = match volume {
        Some(Volume {
            config_map: Some(source),
            ..
        }) => source,
        _ => {
            error!(job = %name, step = STEP, volume = CODE_ZIPPED_VOLUME_NAME, "volume not found");
            return Err(JobError::malformed(
                STEP,
                format!("no config map volume named '{CODE_ZIPPED_VOLUME_NAME}'"),
            ));
        }
    };

    if let Some(existing) = source.name.as_deref().filter(|n| !n.is_empty()) {
        error!(job = %name, step = STEP, bound = %existing, "volume already bound");
        return Err(JobError::malformed(
            STEP,
            format!("volume '{CODE_ZIPPED_VOLUME_NAME}' is already bound to '{existing}'"),
        ));
    }

    source.name = Some(cm_name.to_string());
    debug!(job = %name, config_map = %cm_name, "bound code volume");
    Ok(())
}

/// Fail if any ConfigMap-backed volume is still pending.
pub fn ensure_bound(job: &Job) -> Result<(), JobError> {
    match job
        .pod_spec()
        .volumes
        .iter()
        .find(|v| v.config_map_binding() == Some(ConfigMapBinding::Pending))
    {
        Some(volume) => Err(JobError::UnboundConfigMap {
            volume: volume.name.clone(),
        }),
        None => Ok(()),
    }
}

/// Add environment variables to every application container.
///
/// A variable that already exists on a container has its value replaced.
pub fn add_extra_env(job: &mut Job, env: &BTreeMap<String, String>) {
    for container in &mut job.pod_spec_mut().containers {
        for (name, value) in env {
            match container.env.iter_mut().find(|e| &e.name == name) {
                Some(existing) => *existing = EnvVar::literal(name, value),
                None => container.env.push(EnvVar::literal(name, value)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_job, JOB_CONTAINER_NAME};
    use crate::description::JobDescription;

    fn job() -> Job {
        let desc = JobDescription {
            args: Some(vec!["ls".to_string(), "-lh".to_string()]),
            env: [("MYENV".to_string(), "MYVALUE".to_string())].into(),
            ..JobDescription::new("name", "alpine")
        };
        let mut job = build_job(&desc);
        job.metadata.annotations.insert("foo".into(), "bar".into());
        job.metadata.labels.insert("baz".into(), "qux".into());
        job
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // =========================================================================
    // patch
    // =========================================================================

    #[test]
    fn patch_sets_namespace_on_job_and_template() {
        let mut job = job();
        patch(&mut job, None, &BTreeMap::new(), &BTreeMap::new(), "myuser");

        assert_eq!(job.metadata.namespace.as_deref(), Some("myuser"));
        assert_eq!(job.spec.template.metadata.namespace.as_deref(), Some("myuser"));
    }

    #[test]
    fn patch_derives_namespace_from_identity() {
        let mut job = job();
        patch(
            &mut job,
            None,
            &BTreeMap::new(),
            &BTreeMap::new(),
            "taugspurger@microsoft.com",
        );
        assert_eq!(
            job.metadata.namespace.as_deref(),
            Some("taugspurger-microsoft-com")
        );
        assert_eq!(job.metadata.namespace, job.spec.template.metadata.namespace);
    }

    #[test]
    fn patch_merges_labels_and_annotations() {
        let mut job = job();
        patch(
            &mut job,
            None,
            &map(&[("foo", "new"), ("extra", "a")]),
            &map(&[("user", "myuser")]),
            "myuser",
        );

        assert_eq!(job.metadata.annotations, map(&[("foo", "new"), ("extra", "a")]));
        assert_eq!(job.metadata.labels, map(&[("baz", "qux"), ("user", "myuser")]));
        assert_eq!(
            job.spec.template.metadata.annotations,
            map(&[("foo", "new"), ("extra", "a")])
        );
        assert_eq!(job.spec.template.metadata.labels, map(&[("user", "myuser")]));
    }

    #[test]
    fn patch_namespaces_config_map() {
        let mut job = job();
        let mut cm = ConfigMap::default();
        patch(
            &mut job,
            Some(&mut cm),
            &BTreeMap::new(),
            &BTreeMap::new(),
            "myuser",
        );
        assert_eq!(cm.metadata.namespace.as_deref(), Some("myuser"));
    }

    #[test]
    fn patch_twice_is_stable() {
        let mut once = job();
        patch(&mut once, None, &map(&[("a", "1")]), &map(&[("b", "2")]), "u");
        let mut twice = once.clone();
        patch(&mut twice, None, &map(&[("a", "1")]), &map(&[("b", "2")]), "u");
        assert_eq!(once, twice);
    }

    // =========================================================================
    // add_bootstrap_init_container
    // =========================================================================

    fn with_existing(has_init_containers: bool, has_volumes: bool) -> Job {
        let mut job = job();
        let spec = job.pod_spec_mut();
        if has_init_containers {
            spec.init_containers = vec![Container {
                name: "present-container".to_string(),
                ..Default::default()
            }];
        }
        if has_volumes {
            spec.volumes = vec![Volume::from_empty_dir("present-volume")];
            spec.containers[0].volume_mounts =
                vec![VolumeMount::new("present-volume", "/present-volume")];
        }
        job
    }

    #[test]
    fn bootstrap_cardinality() {
        for has_init_containers in [true, false] {
            for has_volumes in [true, false] {
                let mut job = with_existing(has_init_containers, has_volumes);
                add_bootstrap_init_container(&mut job).unwrap();

                let spec = job.pod_spec();
                let case = format!("init={has_init_containers} volumes={has_volumes}");
                assert_eq!(
                    spec.init_containers.len(),
                    usize::from(has_init_containers) + 1,
                    "{case}"
                );
                assert_eq!(spec.volumes.len(), usize::from(has_volumes) + 2, "{case}");
                assert_eq!(
                    spec.containers[0].volume_mounts.len(),
                    usize::from(has_volumes) + 1,
                    "{case}"
                );
            }
        }
    }

    #[test]
    fn bootstrap_preserves_existing_entries() {
        let mut job = with_existing(true, true);
        add_bootstrap_init_container(&mut job).unwrap();

        let spec = job.pod_spec();
        assert_eq!(spec.init_containers[0].name, "present-container");
        assert_eq!(spec.init_containers[1].name, INIT_CONTAINER_NAME);
        assert_eq!(spec.volumes[0].name, "present-volume");
        assert_eq!(spec.containers[0].volume_mounts[0].name, "present-volume");
    }

    #[test]
    fn bootstrap_volume_order_and_sources() {
        let mut job = job();
        add_bootstrap_init_container(&mut job).unwrap();

        let volumes = &job.pod_spec().volumes;
        assert_eq!(volumes[0].name, CODE_ZIPPED_VOLUME_NAME);
        assert_eq!(volumes[0].config_map_binding(), Some(ConfigMapBinding::Pending));
        assert_eq!(volumes[1].name, CODE_VOLUME_NAME);
        assert!(volumes[1].empty_dir.is_some());

        let primary = &job.pod_spec().containers[0];
        assert_eq!(primary.name, JOB_CONTAINER_NAME);
        assert_eq!(primary.working_dir.as_deref(), Some(CODE_MOUNT_PATH));
    }

    #[test]
    fn bootstrap_leaves_no_dangling_mounts() {
        let mut job = with_existing(true, true);
        add_bootstrap_init_container(&mut job).unwrap();

        let spec = job.pod_spec();
        let mounts = spec
            .containers
            .iter()
            .chain(&spec.init_containers)
            .flat_map(|c| &c.volume_mounts);
        for mount in mounts {
            assert!(
                spec.volumes.iter().any(|v| v.name == mount.name),
                "dangling mount {}",
                mount.name
            );
        }
    }

    #[test]
    fn bootstrap_uses_configured_image() {
        let mut job = job();
        let config = BootstrapConfig {
            image: "registry.local/unzip:1".to_string(),
        };
        add_bootstrap_init_container_with(&mut job, &config).unwrap();
        assert_eq!(
            job.pod_spec().init_containers[0].image.as_deref(),
            Some("registry.local/unzip:1")
        );
    }

    #[test]
    fn bootstrap_without_containers_is_malformed() {
        let mut job = job();
        job.pod_spec_mut().containers.clear();
        let before = job.clone();

        let err = add_bootstrap_init_container(&mut job).unwrap_err();
        assert!(matches!(
            err,
            JobError::MalformedManifest {
                step: "add_bootstrap_init_container",
                ..
            }
        ));
        assert_eq!(job, before);
    }

    // =========================================================================
    // bind_config_map_volume / ensure_bound
    // =========================================================================

    fn created_config_map(name: &str) -> ConfigMap {
        ConfigMap::new(ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("my-namespace".to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn bind_sets_config_map_name() {
        for (has_init_containers, has_volumes) in [(true, true), (false, false)] {
            let mut job = with_existing(has_init_containers, has_volumes);
            patch(&mut job, None, &BTreeMap::new(), &BTreeMap::new(), "myuser");
            add_bootstrap_init_container(&mut job).unwrap();

            bind_config_map_volume(&mut job, &created_config_map("actual-name")).unwrap();

            let volumes = &job.pod_spec().volumes;
            let source = volumes[volumes.len() - 2].config_map.as_ref().unwrap();
            assert_eq!(source.name.as_deref(), Some("actual-name"));
            assert_eq!(job.metadata.namespace.as_deref(), Some("myuser"));
        }
    }

    #[test]
    fn bind_requires_server_assigned_name() {
        let mut job = job();
        add_bootstrap_init_container(&mut job).unwrap();

        let err = bind_config_map_volume(&mut job, &ConfigMap::default()).unwrap_err();
        assert!(matches!(err, JobError::MalformedManifest { .. }));
    }

    #[test]
    fn bind_without_bootstrap_is_malformed() {
        let mut job = job();
        let err = bind_config_map_volume(&mut job, &created_config_map("x")).unwrap_err();
        assert!(matches!(
            err,
            JobError::MalformedManifest {
                step: "bind_config_map_volume",
                ..
            }
        ));
    }

    #[test]
    fn bind_happens_once() {
        let mut job = job();
        add_bootstrap_init_container(&mut job).unwrap();
        bind_config_map_volume(&mut job, &created_config_map("first")).unwrap();

        assert!(bind_config_map_volume(&mut job, &created_config_map("second")).is_err());
        let volumes = &job.pod_spec().volumes;
        assert_eq!(
            volumes[volumes.len() - 2].config_map_binding(),
            Some(ConfigMapBinding::Bound("first"))
        );
    }

    #[test]
    fn ensure_bound_rejects_pending_volume() {
        let mut job = job();
        assert!(ensure_bound(&job).is_ok());

        add_bootstrap_init_container(&mut job).unwrap();
        match ensure_bound(&job).unwrap_err() {
            JobError::UnboundConfigMap { volume } => assert_eq!(volume, CODE_ZIPPED_VOLUME_NAME),
            other => panic!("unexpected error: {other:?}"),
        }

        bind_config_map_volume(&mut job, &created_config_map("actual-name")).unwrap();
        assert!(ensure_bound(&job).is_ok());
    }

    // =========================================================================
    // add_extra_env
    // =========================================================================

    #[test]
    fn extra_env_appends_and_overrides() {
        let mut job = job();
        add_extra_env(
            &mut job,
            &map(&[("MYENV", "OVERRIDDEN"), ("DASK_GATEWAY__ADDRESS", "http://gw")]),
        );

        let env = &job.pod_spec().containers[0].env;
        assert_eq!(
            env,
            &vec![
                EnvVar::literal("MYENV", "OVERRIDDEN"),
                EnvVar::literal("DASK_GATEWAY__ADDRESS", "http://gw"),
            ]
        );
    }
}
