//! Error taxonomy for remote calls
//!
//! The split matters for retry and abort behavior: `Auth` and
//! `EnvironmentNotFound` are fatal and never retried, `Transient` is
//! retried with bounded backoff, everything else surfaces as-is.

/// Result type for drift-remote operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur talking to the remote rule service
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication rejected by remote service (status {status})")]
    Auth { status: u16 },

    #[error("credential environment variable '{var}' is not set")]
    MissingCredential { var: String },

    #[error("environment '{env}' not found for organization '{org}' on remote service")]
    EnvironmentNotFound { org: String, env: String },

    #[error("transient remote failure: {message}")]
    Transient { message: String },

    #[error("remote service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode remote response: {message}")]
    Decode { message: String },

    #[error("failed to load remote settings from {path}: {message}")]
    Settings { path: String, message: String },
}

impl Error {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Whether this failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Whether this failure must abort the whole invocation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. } | Self::MissingCredential { .. } | Self::EnvironmentNotFound { .. }
        )
    }
}
