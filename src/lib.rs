//! kbatch - sandboxed Kubernetes batch jobs for shared clusters
//!
//! Users describe a job (image, command, environment, optional code); kbatch
//! turns it into a Job confined to the user's own namespace and submits it.
//!
//! # Modules
//!
//! - [`config`] - Operator settings applied to every job
//! - [`cluster`] - Cluster API seam and its kube-rs implementation
//! - [`submit`] - Job preparation and the ordered submission pipeline
//! - [`error`] - Error types
//!
//! Building, parsing, and patching live in `kbatch-job`; the Kubernetes
//! object model lives in `kbatch-common`.

#![deny(missing_docs)]

pub mod cluster;
pub mod config;
pub mod error;
pub mod submit;

pub use error::Error;

/// Result type alias using kbatch's Error type
pub type Result<T> = std::result::Result<T, Error>;
