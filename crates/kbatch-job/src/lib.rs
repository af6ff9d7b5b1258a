//! Job building, parsing, and patching for kbatch
//!
//! Turns a user's job description into a sandboxed Kubernetes Job:
//! - `builder` expands a description into a baseline manifest
//! - `parser` strictly parses untyped manifests (and round-trips them)
//! - `namespace` derives a per-user namespace from an identity
//! - `patch` applies namespace/labels, injects the code bootstrap, and binds
//!   the code ConfigMap once it has been created
//! - `config_map` builds and namespaces the companion ConfigMap
//! - `template` merges operator job templates under user jobs

pub mod builder;
pub mod config_map;
pub mod description;
pub mod error;
pub mod namespace;
pub mod parser;
pub mod patch;
pub mod template;
pub mod toleration;

pub use builder::{build_job, JOB_CONTAINER_NAME};
pub use config_map::{build_code_config_map, set_namespace, set_owner_reference};
pub use description::JobDescription;
pub use error::JobError;
pub use namespace::{namespace_for_identity, User};
pub use parser::{parse, parse_description, parse_job, serialize};
pub use patch::{
    add_bootstrap_init_container, add_bootstrap_init_container_with, add_extra_env,
    bind_config_map_volume, ensure_bound, patch, BootstrapConfig,
};
pub use template::{apply_template, merge_values};
pub use toleration::parse_toleration;
