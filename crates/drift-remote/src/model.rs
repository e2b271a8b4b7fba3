//! Provider-shaped rule records
//!
//! [`RemoteRule`] mirrors the wire shape of the remote service. Entity
//! mappings stay as raw JSON here: at least two historical shapes coexist
//! in deployed fleets, and decoding them per-rule during canonicalization
//! keeps one legacy oddity from failing a whole page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One page of the rule-listing endpoint.
#[derive(Debug, Deserialize)]
pub struct RulePage {
    #[serde(default)]
    pub value: Vec<RemoteRule>,
    #[serde(default, rename = "nextLink")]
    pub next_link: Option<String>,
}

/// A deployed rule as returned by the remote service.
///
/// The list endpoint omits `entity_mappings` and `custom_details`; those are
/// only populated by the per-rule detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRule {
    pub id: String,
    pub display_name: String,
    pub severity: String,
    pub enabled: bool,
    #[serde(default)]
    pub query: String,
    /// Duration string, clock-time or machine form
    pub query_frequency: String,
    /// Duration string, clock-time or machine form
    pub query_period: String,
    #[serde(default)]
    pub tactics: Vec<String>,
    #[serde(default)]
    pub techniques: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_configuration: Option<RemoteIncidentConfiguration>,
    /// Raw entity mappings; shape variance is resolved at canonicalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_mappings: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_details: Option<BTreeMap<String, String>>,
}

impl RemoteRule {
    /// Whether this record still needs a detail fetch to be complete.
    pub fn needs_detail(&self) -> bool {
        self.entity_mappings.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteIncidentConfiguration {
    #[serde(default)]
    pub create_incident: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping_configuration: Option<RemoteGroupingConfiguration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteGroupingConfiguration {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_method: Option<String>,
}
