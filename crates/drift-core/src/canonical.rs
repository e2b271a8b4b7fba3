//! Canonical rule schema and normalization
//!
//! Both sides of a comparison — desired-state records and provider-shaped
//! remote records — are projected into [`CanonicalRule`] before any diffing
//! happens. Normalization resolves the representation variance the fleet
//! has accumulated: two duration grammars, two entity-mapping shapes, and
//! optional grouping blocks.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use drift_remote::RemoteRule;
use drift_store::{RuleDefinition, Severity, duration};

use crate::slug::{NamingStrategy, SlugNaming};
use crate::{Error, Result};

/// Which side produced a canonical record. Provenance only; excluded from
/// equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    Desired,
    Actual,
}

/// Normalized grouping configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    pub enabled: bool,
    pub matching_method: String,
}

impl Grouping {
    /// The one defaulting point for grouping: absent pieces fill in as
    /// disabled / "AllEntities". Every canonicalization path funnels
    /// through here; callers never apply their own defaults.
    pub fn from_parts(enabled: Option<bool>, matching_method: Option<String>) -> Self {
        Self {
            enabled: enabled.unwrap_or(false),
            matching_method: matching_method.unwrap_or_else(|| "AllEntities".to_string()),
        }
    }
}

impl Default for Grouping {
    fn default() -> Self {
        Self::from_parts(None, None)
    }
}

/// One normalized entity-to-field mapping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntityRef {
    pub entity_type: String,
    pub identifier: String,
    pub column: String,
}

/// The unified schema both sides are compared under.
#[derive(Debug, Clone)]
pub struct CanonicalRule {
    pub identifier: String,
    pub display_name: String,
    /// Query text, compared verbatim
    pub query: String,
    pub severity: Severity,
    pub enabled: bool,
    pub frequency: Duration,
    pub period: Duration,
    pub tactics: BTreeSet<String>,
    pub techniques: BTreeSet<String>,
    pub create_incident: bool,
    pub grouping: Grouping,
    pub entities: BTreeSet<EntityRef>,
    /// Carried for import fidelity; not part of the drift comparison
    pub custom_details: BTreeMap<String, String>,
    pub source: RuleSource,
}

impl PartialEq for CanonicalRule {
    /// Field-wise equality with set semantics; `source` is provenance and
    /// deliberately excluded.
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
            && self.display_name == other.display_name
            && self.query == other.query
            && self.severity == other.severity
            && self.enabled == other.enabled
            && self.frequency == other.frequency
            && self.period == other.period
            && self.tactics == other.tactics
            && self.techniques == other.techniques
            && self.create_incident == other.create_incident
            && self.grouping == other.grouping
            && self.entities == other.entities
            && self.custom_details == other.custom_details
    }
}

/// Typed entity-mapping shape (current wire form).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypedEntityMapping {
    entity_type: String,
    #[serde(default)]
    field_mappings: Vec<TypedFieldMapping>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypedFieldMapping {
    identifier: String,
    column_name: String,
}

/// The two known entity-mapping shapes, attempted in priority order:
/// the typed array first, the legacy flat object second. Anything else is
/// an explicit unrecognized-format error, never a guess.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntityMappingShape {
    Typed(Vec<TypedEntityMapping>),
    Flat(BTreeMap<String, String>),
}

/// Legacy flat-object keys and the canonical entity they expand to.
const WELL_KNOWN_ENTITY_KEYS: &[(&str, &str, &str)] = &[
    ("accountCustomEntity", "Account", "FullName"),
    ("hostCustomEntity", "Host", "HostName"),
    ("ipCustomEntity", "IP", "Address"),
    ("urlCustomEntity", "URL", "Url"),
    ("fileHashCustomEntity", "FileHash", "Value"),
];

/// Projects desired and remote records into [`CanonicalRule`].
pub struct Canonicalizer {
    naming: Box<dyn NamingStrategy>,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Canonicalizer {
    pub fn new() -> Self {
        Self {
            naming: Box::new(SlugNaming),
        }
    }

    pub fn with_naming(naming: Box<dyn NamingStrategy>) -> Self {
        Self { naming }
    }

    /// Project a desired-state record. Total: stored records are already
    /// well-typed, so no error path exists.
    pub fn from_desired(&self, rule: &RuleDefinition) -> CanonicalRule {
        let grouping = match &rule.grouping {
            Some(g) => Grouping::from_parts(Some(g.enabled), Some(g.matching_method.clone())),
            None => Grouping::from_parts(None, None),
        };

        CanonicalRule {
            identifier: rule.name.clone(),
            display_name: rule.display_name.clone(),
            query: rule.query_body.clone(),
            severity: rule.severity,
            enabled: rule.enabled,
            frequency: rule.frequency,
            period: rule.period,
            tactics: rule.tactics.iter().cloned().collect(),
            techniques: rule.techniques.iter().cloned().collect(),
            create_incident: rule.create_incident,
            grouping,
            entities: rule
                .entities
                .iter()
                .map(|m| EntityRef {
                    entity_type: m.entity_type.clone(),
                    identifier: m.identifier.clone(),
                    column: m.column.clone(),
                })
                .collect(),
            custom_details: rule.custom_details.clone(),
            source: RuleSource::Desired,
        }
    }

    /// Project a remote record, normalizing every known legacy shape.
    ///
    /// # Errors
    ///
    /// `UnrecognizedFormat` when a duration, severity, or entity-mapping
    /// value matches none of the known representations.
    pub fn from_remote(&self, rule: &RemoteRule) -> Result<CanonicalRule> {
        let severity = Severity::from_str(&rule.severity)
            .map_err(|_| Error::unrecognized("severity", &rule.severity))?;

        let frequency = canonical_duration("frequency", &rule.query_frequency)?;
        let period = canonical_duration("period", &rule.query_period)?;
        let entities = canonical_entities(rule.entity_mappings.as_ref())?;

        let (create_incident, grouping) = match &rule.incident_configuration {
            Some(incident) => {
                let grouping = match &incident.grouping_configuration {
                    Some(g) => {
                        Grouping::from_parts(Some(g.enabled), g.matching_method.clone())
                    }
                    None => Grouping::from_parts(None, None),
                };
                (incident.create_incident, grouping)
            }
            None => (false, Grouping::from_parts(None, None)),
        };

        Ok(CanonicalRule {
            identifier: self.naming.derive(&rule.display_name),
            display_name: rule.display_name.clone(),
            query: rule.query.clone(),
            severity,
            enabled: rule.enabled,
            frequency,
            period,
            tactics: rule.tactics.iter().cloned().collect(),
            techniques: rule.techniques.iter().cloned().collect(),
            create_incident,
            grouping,
            entities,
            custom_details: rule.custom_details.clone().unwrap_or_default(),
            source: RuleSource::Actual,
        })
    }
}

/// Normalize a duration string: clock-time pattern first, machine grammar
/// second, explicit error otherwise.
fn canonical_duration(field: &'static str, raw: &str) -> Result<Duration> {
    duration::parse_clock_time(raw)
        .or_else(|| duration::parse_machine(raw))
        .ok_or_else(|| Error::unrecognized(field, raw))
}

/// Normalize entity mappings from either known wire shape. Absent or empty
/// input produces an empty set, never null.
fn canonical_entities(raw: Option<&serde_json::Value>) -> Result<BTreeSet<EntityRef>> {
    let Some(value) = raw else {
        return Ok(BTreeSet::new());
    };
    if value.is_null() {
        return Ok(BTreeSet::new());
    }

    let shape: EntityMappingShape = serde_json::from_value(value.clone())
        .map_err(|_| Error::unrecognized("entity mappings", value.to_string()))?;

    match shape {
        EntityMappingShape::Typed(mappings) => Ok(mappings
            .into_iter()
            .flat_map(|m| {
                let entity_type = m.entity_type;
                m.field_mappings.into_iter().map(move |f| EntityRef {
                    entity_type: entity_type.clone(),
                    identifier: f.identifier,
                    column: f.column_name,
                })
            })
            .collect()),
        EntityMappingShape::Flat(map) => {
            let mut entities = BTreeSet::new();
            for (key, column) in map {
                let known = WELL_KNOWN_ENTITY_KEYS
                    .iter()
                    .find(|(k, _, _)| *k == key)
                    .ok_or_else(|| Error::unrecognized("entity mappings", key.clone()))?;
                entities.insert(EntityRef {
                    entity_type: known.1.to_string(),
                    identifier: known.2.to_string(),
                    column,
                });
            }
            Ok(entities)
        }
    }
}
