//! Drift computation between canonical rule collections

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Serialize;

use drift_store::duration::format_machine;

use crate::canonical::CanonicalRule;

/// Classification of one divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriftKind {
    /// Declared locally, not deployed — expected prior to a deploy step
    MissingInActual,
    /// Deployed remotely with no local record
    ExtraInActual,
    /// Present on both sides with differing fields
    Modified,
    /// Present in a source environment, absent from the target
    MissingInTarget,
}

/// One field-level difference on a modified rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub field: &'static str,
    pub desired: String,
    pub actual: String,
}

/// One detected divergence.
#[derive(Debug, Clone, Serialize)]
pub struct DriftRecord {
    pub rule_id: String,
    pub kind: DriftKind,
    /// Populated only for [`DriftKind::Modified`]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_diffs: Vec<FieldDiff>,
}

impl DriftRecord {
    fn existence(rule_id: &str, kind: DriftKind) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            kind,
            field_diffs: Vec::new(),
        }
    }
}

/// Compare desired against actual state.
///
/// Output is deterministic: missing records first, then extra, then
/// modified, each sorted by identifier, and field diffs in a fixed
/// comparison order — stable output matters for diffing CI logs.
pub fn diff(desired: &[CanonicalRule], actual: &[CanonicalRule]) -> Vec<DriftRecord> {
    let desired_by_id: BTreeMap<&str, &CanonicalRule> =
        desired.iter().map(|r| (r.identifier.as_str(), r)).collect();
    let actual_by_id: BTreeMap<&str, &CanonicalRule> =
        actual.iter().map(|r| (r.identifier.as_str(), r)).collect();

    let mut records = Vec::new();

    for (id, _) in &desired_by_id {
        if !actual_by_id.contains_key(id) {
            records.push(DriftRecord::existence(id, DriftKind::MissingInActual));
        }
    }

    for (id, _) in &actual_by_id {
        if !desired_by_id.contains_key(id) {
            records.push(DriftRecord::existence(id, DriftKind::ExtraInActual));
        }
    }

    for (id, desired_rule) in &desired_by_id {
        if let Some(actual_rule) = actual_by_id.get(id) {
            let diffs = field_diffs(desired_rule, actual_rule);
            if !diffs.is_empty() {
                records.push(DriftRecord {
                    rule_id: id.to_string(),
                    kind: DriftKind::Modified,
                    field_diffs: diffs,
                });
            }
        }
    }

    records
}

/// One-directional promotion-gap detection: identifiers present in the
/// source environment but absent from the target. Field content is never
/// compared — environments legitimately differ in severity and incident
/// policy; only presence signals a pending promotion.
pub fn promotion_gap(source: &[CanonicalRule], target: &[CanonicalRule]) -> Vec<DriftRecord> {
    let target_ids: BTreeSet<&str> = target.iter().map(|r| r.identifier.as_str()).collect();

    source
        .iter()
        .map(|r| r.identifier.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|id| !target_ids.contains(id))
        .map(|id| DriftRecord::existence(id, DriftKind::MissingInTarget))
        .collect()
}

/// Field-by-field comparison in the fixed order: severity, enabled,
/// frequency, period, query, create_incident, grouping, entities, tactics,
/// techniques.
fn field_diffs(desired: &CanonicalRule, actual: &CanonicalRule) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();
    let mut push = |field: &'static str, d: String, a: String| {
        if d != a {
            diffs.push(FieldDiff {
                field,
                desired: d,
                actual: a,
            });
        }
    };

    push("severity", desired.severity.to_string(), actual.severity.to_string());
    push("enabled", desired.enabled.to_string(), actual.enabled.to_string());
    push(
        "frequency",
        format_machine(desired.frequency),
        format_machine(actual.frequency),
    );
    push(
        "period",
        format_machine(desired.period),
        format_machine(actual.period),
    );
    push("query", desired.query.clone(), actual.query.clone());
    push(
        "create_incident",
        desired.create_incident.to_string(),
        actual.create_incident.to_string(),
    );
    push(
        "grouping",
        render_grouping(&desired.grouping),
        render_grouping(&actual.grouping),
    );
    push(
        "entities",
        render_entities(desired),
        render_entities(actual),
    );
    push("tactics", render_set(&desired.tactics), render_set(&actual.tactics));
    push(
        "techniques",
        render_set(&desired.techniques),
        render_set(&actual.techniques),
    );

    diffs
}

fn render_grouping(grouping: &crate::canonical::Grouping) -> String {
    format!(
        "enabled={} method={}",
        grouping.enabled, grouping.matching_method
    )
}

fn render_entities(rule: &CanonicalRule) -> String {
    rule.entities
        .iter()
        .map(|e| format!("{}/{}={}", e.entity_type, e.identifier, e.column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_set(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}
