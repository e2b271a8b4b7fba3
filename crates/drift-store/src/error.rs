//! Error types for drift-store

use std::path::PathBuf;

/// Result type for drift-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in drift-store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("environment '{env}' not found for organization '{org}'")]
    EnvironmentNotFound { org: String, env: String },

    #[error("organization '{org}' not found in store")]
    OrganizationNotFound { org: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("query file reference '{reference}' escapes the environment directory")]
    InvalidQueryReference { reference: String },

    #[error("failed to serialize rule collection: {message}")]
    Serialize { message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
