//! Rule collection storage
//!
//! [`RuleStore`] reads and writes per-environment rule collections. Loading
//! is tolerant: each record in the collection file is decoded individually,
//! so one malformed record is skipped (and reported) without failing the
//! batch. Saving is content-idempotent: unchanged records and query bodies
//! are never rewritten, so a no-op import leaves file mtimes untouched.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout::StoreLayout;
use crate::rule::RuleDefinition;
use crate::{Error, Result, io};

fn default_version() -> String {
    "1.0".to_string()
}

/// On-disk shape of a rule collection.
///
/// Records are kept as raw YAML values so that decoding failures are scoped
/// to one record, and so that upserts never drop sibling records this
/// process cannot parse.
#[derive(Debug, Serialize, Deserialize)]
struct RawCollection {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    rules: Vec<serde_yaml::Value>,
}

impl Default for RawCollection {
    fn default() -> Self {
        Self {
            version: default_version(),
            rules: Vec::new(),
        }
    }
}

/// A record that could not be loaded, with the reason it was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRule {
    /// Record name, or a positional label when the name itself is unreadable
    pub name: String,
    pub reason: String,
}

/// Result of loading an environment's rule collection.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub rules: Vec<RuleDefinition>,
    pub skipped: Vec<SkippedRule>,
}

/// What a save actually touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub record_written: bool,
    pub query_written: bool,
}

impl SaveOutcome {
    pub fn changed(&self) -> bool {
        self.record_written || self.query_written
    }
}

/// Desired-state store for rule collections.
pub struct RuleStore {
    layout: StoreLayout,
}

impl RuleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: StoreLayout::new(root),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Load every rule record for an (organization, environment) pair,
    /// attaching each record's query body.
    ///
    /// # Errors
    ///
    /// `EnvironmentNotFound` if the environment directory does not exist;
    /// `Parse` if the collection file itself is unreadable as YAML. A
    /// malformed individual record is logged, recorded in
    /// [`LoadOutcome::skipped`], and does not fail the load.
    pub fn load_rules(&self, org: &str, env: &str) -> Result<LoadOutcome> {
        let env_dir = self.layout.env_dir(org, env);
        if !env_dir.is_dir() {
            return Err(Error::EnvironmentNotFound {
                org: org.to_string(),
                env: env.to_string(),
            });
        }

        let rules_file = self.layout.rules_file(org, env);
        if !rules_file.is_file() {
            // A declared environment with no collection yet is empty, not an error.
            return Ok(LoadOutcome::default());
        }

        let content = io::read_text(&rules_file)?;
        let raw: RawCollection = serde_yaml::from_str(&content)
            .map_err(|e| Error::parse(&rules_file, e.to_string()))?;

        let mut outcome = LoadOutcome::default();
        for (index, value) in raw.rules.into_iter().enumerate() {
            let label = record_label(&value, index);
            match self.decode_record(org, env, value) {
                Ok(rule) => outcome.rules.push(rule),
                Err(e) => {
                    tracing::warn!(rule = %label, error = %e, "skipping malformed rule record");
                    outcome.skipped.push(SkippedRule {
                        name: label,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    fn decode_record(
        &self,
        org: &str,
        env: &str,
        value: serde_yaml::Value,
    ) -> Result<RuleDefinition> {
        let mut rule: RuleDefinition = serde_yaml::from_value(value)
            .map_err(|e| Error::parse(self.layout.rules_file(org, env), e.to_string()))?;

        let query_path = self
            .layout
            .query_file(org, env, &rule.query_file)
            .ok_or_else(|| Error::InvalidQueryReference {
                reference: rule.query_file.clone(),
            })?;
        rule.query_body = io::read_text(&query_path)?;
        Ok(rule)
    }

    /// Upsert one rule and its query body.
    ///
    /// Writes are atomic and content-idempotent: if the stored query text
    /// and serialized record already match, nothing is rewritten. `force`
    /// bypasses both skips. Records in the collection this process cannot
    /// parse are preserved verbatim.
    pub fn save_rule(
        &self,
        org: &str,
        env: &str,
        rule: &RuleDefinition,
        force: bool,
    ) -> Result<SaveOutcome> {
        let query_path = self
            .layout
            .query_file(org, env, &rule.query_file)
            .ok_or_else(|| Error::InvalidQueryReference {
                reference: rule.query_file.clone(),
            })?;

        let query_written = self.write_query(&query_path, &rule.query_body, force)?;
        let record_written = self.write_record(org, env, rule, force)?;

        Ok(SaveOutcome {
            record_written,
            query_written,
        })
    }

    fn write_query(&self, path: &Path, body: &str, force: bool) -> Result<bool> {
        let existing = io::file_checksum(path)?;
        if !force && existing.as_deref() == Some(io::content_checksum(body).as_str()) {
            tracing::debug!(path = %path.display(), "query body unchanged, skipping write");
            return Ok(false);
        }
        io::write_atomic(path, body.as_bytes())?;
        Ok(true)
    }

    fn write_record(&self, org: &str, env: &str, rule: &RuleDefinition, force: bool) -> Result<bool> {
        let rules_file = self.layout.rules_file(org, env);
        let existing = if rules_file.is_file() {
            Some(io::read_text(&rules_file)?)
        } else {
            None
        };

        let mut raw: RawCollection = match &existing {
            Some(content) => serde_yaml::from_str(content)
                .map_err(|e| Error::parse(&rules_file, e.to_string()))?,
            None => RawCollection::default(),
        };

        let record = serde_yaml::to_value(rule).map_err(|e| Error::Serialize {
            message: e.to_string(),
        })?;

        let position = raw.rules.iter().position(|v| {
            v.get("name").and_then(serde_yaml::Value::as_str) == Some(rule.name.as_str())
        });
        match position {
            Some(idx) => raw.rules[idx] = record,
            None => raw.rules.push(record),
        }

        let serialized = serde_yaml::to_string(&raw).map_err(|e| Error::Serialize {
            message: e.to_string(),
        })?;

        if !force && existing.as_deref() == Some(serialized.as_str()) {
            tracing::debug!(rule = %rule.name, "rule record unchanged, skipping write");
            return Ok(false);
        }

        io::write_atomic(&rules_file, serialized.as_bytes())?;
        Ok(true)
    }

    /// List environment names under an organization, sorted.
    pub fn list_environments(&self, org: &str) -> Result<Vec<String>> {
        let org_dir = self.layout.org_dir(org);
        if !org_dir.is_dir() {
            return Err(Error::OrganizationNotFound {
                org: org.to_string(),
            });
        }
        list_directories(&org_dir)
    }

    /// List organization names under the store root, sorted.
    pub fn list_organizations(&self) -> Result<Vec<String>> {
        if !self.layout.root().is_dir() {
            return Ok(Vec::new());
        }
        list_directories(self.layout.root())
    }
}

fn record_label(value: &serde_yaml::Value, index: usize) -> String {
    value
        .get("name")
        .and_then(serde_yaml::Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("record #{}", index + 1))
}

fn list_directories(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if path.is_dir() && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
