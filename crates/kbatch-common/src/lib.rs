//! Common types for kbatch: the Kubernetes object model, errors, and utilities

#![deny(missing_docs)]

pub mod error;
pub mod k8s;
pub mod telemetry;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Label recording which user submitted a job
pub const LABEL_USER: &str = "kbatch.jupyter.org/username";

/// Label marking objects created by kbatch
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value for [`LABEL_MANAGED_BY`]
pub const LABEL_MANAGED_BY_KBATCH: &str = "kbatch";
