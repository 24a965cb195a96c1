//! Policy document errors

use std::path::PathBuf;

use thiserror::Error;

use frontdoor_common::FrontDoorError;

/// Errors raised while loading or persisting the policy document
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The document on disk exists but is not a valid policy document
    #[error("policy document {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document could not be read, written, locked or renamed into place
    #[error("policy document {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The in-memory document could not be serialized
    #[error("failed to serialize policy document: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<PolicyError> for FrontDoorError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Corrupt { path, source } => FrontDoorError::PolicyCorrupt {
                path: path.display().to_string(),
                message: source.to_string(),
            },
            PolicyError::Persistence { path, source } => FrontDoorError::Persistence {
                path: path.display().to_string(),
                message: source.to_string(),
                source: Some(Box::new(source)),
            },
            PolicyError::Serialize(source) => FrontDoorError::Persistence {
                path: String::new(),
                message: source.to_string(),
                source: Some(Box::new(source)),
            },
        }
    }
}
