//! Operator configuration
//!
//! Every setting can be given as a flag or through a `KBATCH_*` environment
//! variable. [`ProxyConfig::resolve`] validates the raw values and loads the
//! job template once, producing the [`JobSettings`] applied to every job.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use kbatch_job::patch::{BootstrapConfig, DEFAULT_INIT_IMAGE};
use serde_json::Value;
use tracing::debug;

use crate::{Error, Result};

/// Raw operator configuration
#[derive(Args, Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Partial Job (YAML or JSON) merged under every user job
    #[arg(long, env = "KBATCH_JOB_TEMPLATE_FILE")]
    pub job_template_file: Option<PathBuf>,

    /// Environment variables added to every job container (KEY=VALUE)
    #[arg(long = "extra-env", env = "KBATCH_JOB_EXTRA_ENV", value_delimiter = ',')]
    pub extra_env: Vec<String>,

    /// Labels added to every job (KEY=VALUE)
    #[arg(long = "label", env = "KBATCH_JOB_LABELS", value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Annotations added to every job (KEY=VALUE)
    #[arg(long = "annotation", env = "KBATCH_JOB_ANNOTATIONS", value_delimiter = ',')]
    pub annotations: Vec<String>,

    /// Image for the init container that unpacks user code
    #[arg(long, env = "KBATCH_INIT_IMAGE", default_value = DEFAULT_INIT_IMAGE)]
    pub init_image: String,
}

/// Validated settings applied to every submitted job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobSettings {
    /// Job template merged under user jobs
    pub job_template: Option<Value>,
    /// Extra environment for job containers
    pub extra_env: BTreeMap<String, String>,
    /// Extra labels
    pub labels: BTreeMap<String, String>,
    /// Extra annotations
    pub annotations: BTreeMap<String, String>,
    /// Init container settings
    pub bootstrap: BootstrapConfig,
}

impl ProxyConfig {
    /// Validate the configuration and load the job template
    pub fn resolve(&self) -> Result<JobSettings> {
        let job_template = match &self.job_template_file {
            Some(path) => Some(load_job_template(path)?),
            None => None,
        };

        let init_image = if self.init_image.is_empty() {
            DEFAULT_INIT_IMAGE.to_string()
        } else {
            self.init_image.clone()
        };

        Ok(JobSettings {
            job_template,
            extra_env: parse_pairs("extra-env", &self.extra_env)?,
            labels: parse_pairs("label", &self.labels)?,
            annotations: parse_pairs("annotation", &self.annotations)?,
            bootstrap: BootstrapConfig { image: init_image },
        })
    }
}

/// Read a job template file
pub fn load_job_template(path: &std::path::Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let template = kbatch_common::yaml::parse_yaml(&raw)?;
    if !template.is_object() {
        return Err(kbatch_common::Error::validation_for_field(
            "job-template-file",
            format!("{} must contain a mapping", path.display()),
        )
        .into());
    }
    debug!(path = %path.display(), "loaded job template");
    Ok(template)
}

/// Parse `KEY=VALUE` entries. Later entries win.
fn parse_pairs(option: &str, entries: &[String]) -> Result<BTreeMap<String, String>> {
    entries
        .iter()
        .filter(|e| !e.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(kbatch_common::Error::validation_for_field(
                option,
                format!("'{entry}' is not KEY=VALUE"),
            )
            .into()),
        })
        .collect()
}
