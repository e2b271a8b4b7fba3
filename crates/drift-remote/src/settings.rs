//! Remote endpoint settings
//!
//! Loaded from a `[remote]` table in `ruledrift.toml` at the store root.
//! The bearer token is never stored in the file; only the name of the
//! environment variable holding it is.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

fn default_api_version() -> String {
    "2024-01-01".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    4
}

fn default_token_env() -> String {
    "RULEDRIFT_TOKEN".to_string()
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    remote: RemoteSettings,
}

/// Connection settings for the remote rule service.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the rule-management API
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Per-call timeout; a timeout is treated as a transient failure
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry ceiling for transient failures
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl RemoteSettings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Settings {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let file: SettingsFile = toml::from_str(&content).map_err(|e| Error::Settings {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(file.remote)
    }

    /// Read the bearer token from the configured environment variable.
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.token_env).map_err(|_| Error::MissingCredential {
            var: self.token_env.clone(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
