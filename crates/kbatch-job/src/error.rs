//! Job-specific error types

/// Errors raised while building, parsing, or patching a job
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The input does not match the manifest schema
    #[error("schema mismatch at '{path}': {message}")]
    SchemaMismatch {
        /// Path of the first offending field (e.g. `spec.template.spec.containers[0].name`)
        path: String,
        /// What was wrong with it
        message: String,
    },

    /// The manifest lacks a structural position a patch step needs
    #[error("malformed manifest during {step}: {message}")]
    MalformedManifest {
        /// Patch step that failed
        step: &'static str,
        /// What was missing
        message: String,
    },

    /// A toleration string is not of the form `key=value:effect`
    #[error("invalid toleration '{value}': should be of the form <key>=<value>:<effect>")]
    InvalidToleration {
        /// The offending string
        value: String,
    },

    /// A ConfigMap-backed volume was never bound to a created ConfigMap
    #[error("volume '{volume}' references a ConfigMap that has not been created")]
    UnboundConfigMap {
        /// Name of the unbound volume
        volume: String,
    },

    /// Shared error from `kbatch-common`
    #[error("{0}")]
    Common(#[from] kbatch_common::Error),
}

impl JobError {
    /// Create a malformed-manifest error for the given patch step
    pub fn malformed(step: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedManifest {
            step,
            message: message.into(),
        }
    }
}
