//! Rule record schema
//!
//! A [`RuleDefinition`] is one desired-state record: the scheduling,
//! alerting, and entity-mapping metadata for a scheduled detection rule,
//! plus a reference to the query body stored as a sibling text file.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::machine_format;

/// Alert severity levels, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Informational,
}

impl FromStr for Severity {
    type Err = String;

    /// Case-insensitive parse, since remote records are not consistent
    /// about casing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "informational" => Ok(Self::Informational),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Informational => "Informational",
        };
        f.write_str(name)
    }
}

/// Alert grouping configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Whether alerts are grouped into one incident
    #[serde(default)]
    pub enabled: bool,
    /// Grouping method, e.g. "AllEntities"
    #[serde(default = "GroupingConfig::default_matching_method")]
    pub matching_method: String,
}

impl GroupingConfig {
    fn default_matching_method() -> String {
        "AllEntities".to_string()
    }
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            matching_method: Self::default_matching_method(),
        }
    }
}

/// One entity-to-field mapping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityMapping {
    /// Entity type, e.g. "Account" or "Host"
    pub entity_type: String,
    /// Field identifier within the entity type, e.g. "FullName"
    pub identifier: String,
    /// Source column in the query results
    pub column: String,
}

/// One desired-state rule record.
///
/// `name` is unique within an (organization, environment) pair and doubles
/// as the file stem of the referenced query body. The query text itself is
/// stored out-of-line and attached by the store on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Identifier, unique within the environment
    pub name: String,
    /// Human-readable display name
    pub display_name: String,
    /// Relative path to the query body, e.g. "queries/failed-logins.kql"
    pub query_file: String,
    pub severity: Severity,
    pub enabled: bool,
    /// How often the rule runs
    #[serde(with = "machine_format")]
    pub frequency: Duration,
    /// How far back each run looks
    #[serde(with = "machine_format")]
    pub period: Duration,
    #[serde(default)]
    pub tactics: Vec<String>,
    #[serde(default)]
    pub techniques: Vec<String>,
    #[serde(default)]
    pub create_incident: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping: Option<GroupingConfig>,
    #[serde(default)]
    pub entities: Vec<EntityMapping>,
    /// Custom detail labels mapped to source columns
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_details: BTreeMap<String, String>,
    /// Query body text, attached by the store on load. Never serialized.
    #[serde(skip)]
    pub query_body: String,
}
