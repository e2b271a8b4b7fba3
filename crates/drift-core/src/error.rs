//! Error types for drift-core

/// Result type for drift-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the drift engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A remote field value matched none of the known representations
    #[error("unrecognized {field} format: '{value}'")]
    UnrecognizedFormat { field: &'static str, value: String },

    /// The pipeline was canceled between phases or mid-fetch
    #[error("operation canceled")]
    Canceled,

    /// Import mode invoked on an engine built without a remote client
    #[error("import mode requires a remote client")]
    RemoteRequired,

    /// Storage error from drift-store
    #[error(transparent)]
    Store(#[from] drift_store::Error),

    /// Remote-service error from drift-remote
    #[error(transparent)]
    Remote(#[from] drift_remote::Error),
}

impl Error {
    pub fn unrecognized(field: &'static str, value: impl Into<String>) -> Self {
        Self::UnrecognizedFormat {
            field,
            value: value.into(),
        }
    }

    /// Whether this error must abort the whole invocation rather than
    /// being recorded as a per-rule failure.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Canceled | Self::RemoteRequired => true,
            Self::Store(e) => matches!(
                e,
                drift_store::Error::EnvironmentNotFound { .. }
                    | drift_store::Error::OrganizationNotFound { .. }
            ),
            Self::Remote(e) => e.is_fatal(),
            Self::UnrecognizedFormat { .. } => false,
        }
    }
}
