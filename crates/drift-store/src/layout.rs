//! Store directory layout
//!
//! One directory per environment under an organization root:
//!
//! ```text
//! <root>/<org>/<env>/rules.yaml
//! <root>/<org>/<env>/queries/*.kql
//! ```
//!
//! All path derivation lives here so the rest of the crate never assembles
//! store paths by hand.

use std::path::{Path, PathBuf};

/// File name of the rule collection within an environment directory
pub const RULES_FILE: &str = "rules.yaml";

/// Directory name holding query bodies within an environment directory
pub const QUERIES_DIR: &str = "queries";

/// Path derivation for a store rooted at a fixed directory.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn org_dir(&self, org: &str) -> PathBuf {
        self.root.join(org)
    }

    pub fn env_dir(&self, org: &str, env: &str) -> PathBuf {
        self.root.join(org).join(env)
    }

    pub fn rules_file(&self, org: &str, env: &str) -> PathBuf {
        self.env_dir(org, env).join(RULES_FILE)
    }

    pub fn queries_dir(&self, org: &str, env: &str) -> PathBuf {
        self.env_dir(org, env).join(QUERIES_DIR)
    }

    /// Resolve a record's query-file reference against its environment
    /// directory. References must stay inside the environment tree.
    pub fn query_file(&self, org: &str, env: &str, reference: &str) -> Option<PathBuf> {
        let relative = Path::new(reference);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return None;
        }
        Some(self.env_dir(org, env).join(relative))
    }
}
