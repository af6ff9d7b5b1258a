//! Cluster API collaborator
//!
//! The transformation pipeline never talks to the apiserver directly; it goes
//! through [`ClusterApi`] so the submission sequence can be tested without a
//! cluster. [`KubeClusterApi`] is the kube-rs implementation.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job as K8sJob;
use k8s_openapi::api::core::v1::{ConfigMap as K8sConfigMap, Namespace};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta as KubeObjectMeta;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use kbatch_common::k8s::{ConfigMap, Job, ObjectMeta};

use crate::{Error, Result};

/// Operations the submission pipeline needs from the cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Create the namespace if it does not exist
    async fn ensure_namespace(&self, namespace: &str) -> Result<()>;

    /// Create a ConfigMap, returning it with its server-assigned name and uid
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap>;

    /// Create a Job, returning it with its server-assigned name and uid
    async fn create_job(&self, job: &Job) -> Result<Job>;

    /// Replace the owner references of an existing ConfigMap
    async fn set_config_map_owners(&self, config_map: &ConfigMap) -> Result<()>;
}

/// [`ClusterApi`] backed by a kube-rs client
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the default kubeconfig / in-cluster configuration
    pub async fn try_default() -> Result<Self> {
        Ok(Self::new(Client::try_default().await?))
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        if api.get_opt(namespace).await?.is_some() {
            return Ok(());
        }

        let ns = Namespace {
            metadata: KubeObjectMeta {
                name: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match api.create(&PostParams::default(), &ns).await {
            Ok(_) => {
                info!(namespace = %namespace, "created namespace");
                Ok(())
            }
            // Another request created it first
            Err(kube::Error::Api(e)) if e.code == 409 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap> {
        let namespace = require_namespace(&config_map.metadata, "ConfigMap")?;
        let api: Api<K8sConfigMap> = Api::namespaced(self.client.clone(), namespace);

        let created = api
            .create(&PostParams::default(), &convert(config_map)?)
            .await?;

        let mut result = config_map.clone();
        assign_server_fields(&mut result.metadata, &created.metadata);
        debug!(config_map = %result.metadata.display_name(), namespace = %namespace, "created config map");
        Ok(result)
    }

    async fn create_job(&self, job: &Job) -> Result<Job> {
        let namespace = require_namespace(&job.metadata, "Job")?;
        let api: Api<K8sJob> = Api::namespaced(self.client.clone(), namespace);

        let created = api.create(&PostParams::default(), &convert(job)?).await?;

        let mut result = job.clone();
        assign_server_fields(&mut result.metadata, &created.metadata);
        info!(job = %result.metadata.display_name(), namespace = %namespace, "created job");
        Ok(result)
    }

    async fn set_config_map_owners(&self, config_map: &ConfigMap) -> Result<()> {
        let namespace = require_namespace(&config_map.metadata, "ConfigMap")?;
        let name = config_map
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::validation("ConfigMap has no name"))?;
        let api: Api<K8sConfigMap> = Api::namespaced(self.client.clone(), namespace);

        let patch = serde_json::json!({
            "metadata": { "ownerReferences": config_map.metadata.owner_references }
        });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

fn require_namespace<'a>(meta: &'a ObjectMeta, kind: &str) -> Result<&'a str> {
    meta.namespace
        .as_deref()
        .ok_or_else(|| Error::validation(format!("{kind} has no namespace")))
}

/// Convert between our object model and the k8s-openapi types via JSON
fn convert<T: DeserializeOwned>(object: &impl Serialize) -> Result<T> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

fn assign_server_fields(meta: &mut ObjectMeta, created: &KubeObjectMeta) {
    if created.name.is_some() {
        meta.name = created.name.clone();
    }
    meta.uid = created.uid.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbatch_job::{build_job, JobDescription};

    #[test]
    fn job_converts_to_openapi_type() {
        let mut job = build_job(&JobDescription::new("job1", "alpine"));
        job.metadata.namespace = Some("myuser".to_string());

        let k8s: K8sJob = convert(&job).unwrap();
        assert_eq!(k8s.metadata.generate_name.as_deref(), Some("job1-"));
        let spec = k8s.spec.unwrap();
        assert_eq!(spec.backoff_limit, Some(4));
        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.containers[0].name, "job");
        assert_eq!(pod.restart_policy.as_deref(), Some("Never"));
    }

    #[test]
    fn server_fields_are_copied_back() {
        let mut meta = ObjectMeta::generated("job1-");
        let created = KubeObjectMeta {
            name: Some("job1-x7k2p".to_string()),
            uid: Some("uid-123".to_string()),
            resource_version: Some("42".to_string()),
            ..Default::default()
        };
        assign_server_fields(&mut meta, &created);
        assert_eq!(meta.name.as_deref(), Some("job1-x7k2p"));
        assert_eq!(meta.uid.as_deref(), Some("uid-123"));
        assert_eq!(meta.generate_name.as_deref(), Some("job1-"));
    }

    #[test]
    fn objects_without_namespace_are_rejected() {
        let meta = ObjectMeta::generated("job1-");
        assert!(matches!(
            require_namespace(&meta, "Job"),
            Err(Error::Validation(_))
        ));
    }
}
