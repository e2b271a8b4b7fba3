//! Environments listing command

use std::path::Path;

use colored::Colorize;

use drift_store::RuleStore;

use crate::error::Result;

/// List the environments declared for an organization.
pub fn run_environments(store_root: &Path, org: &str) -> Result<i32> {
    let store = RuleStore::new(store_root);
    let environments = store.list_environments(org)?;

    if environments.is_empty() {
        println!("No environments declared for '{}'.", org.cyan());
        return Ok(0);
    }

    println!("Environments for '{}':", org.cyan());
    for env in &environments {
        println!("  {} {}", "-".green(), env);
    }

    Ok(0)
}
