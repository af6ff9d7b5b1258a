//! Error types shared across kbatch crates
//!
//! Errors carry the context needed to diagnose a rejected submission: the
//! kind of object being handled and, where known, the offending field.

use thiserror::Error;

/// Main error type for shared kbatch operations
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Invalid user or operator input
    #[error("invalid {}: {message}", field.as_deref().unwrap_or("input"))]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.template.spec.containers")
        field: Option<String>,
    },
}

impl Error {
    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create a validation error naming the invalid field or option
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
