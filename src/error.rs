//! Error types for kbatch

use thiserror::Error;

/// Main error type for kbatch operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Job building, parsing, or patching error
    #[error(transparent)]
    Job(#[from] kbatch_job::JobError),

    /// Shared error from `kbatch-common`
    #[error(transparent)]
    Common(#[from] kbatch_common::Error),

    /// Invalid configuration or request
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Reading an input file failed
    #[error("failed to read {path}: {message}")]
    Io {
        /// File being read
        path: String,
        /// Underlying error
        message: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an I/O error for a file
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
