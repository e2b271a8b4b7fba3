//! Reconciliation actions
//!
//! The import direction writes canonical remote rules back into the
//! desired-state store. Promotion gaps are never acted on here: promotion
//! crosses an approval boundary, so detection is read-only and the actual
//! copy is a separately invoked, human-driven operation.

use std::collections::BTreeSet;

use serde::Serialize;

use drift_store::{GroupingConfig, QUERIES_DIR, RuleDefinition, RuleStore};

use crate::canonical::CanonicalRule;
use crate::diff::{DriftKind, DriftRecord};
use crate::slug::disambiguate;

/// Operating mode for one invocation. The two are never combined in a
/// single run, so a remote import cannot clobber a manual edit made
/// between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileMode {
    Import,
    PromotionCheck,
}

/// Write-behavior options for an import run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Report intended writes without touching the store
    pub dry_run: bool,
    /// Rewrite records and query bodies even when content is unchanged
    pub force: bool,
}

/// One rule that failed to reconcile.
#[derive(Debug, Clone, Serialize)]
pub struct RuleFailure {
    pub rule: String,
    pub error: String,
}

/// Result of an import pass.
#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub actions: Vec<String>,
    pub failures: Vec<RuleFailure>,
}

/// Applies import actions against a [`RuleStore`].
pub struct Reconciler<'a> {
    store: &'a RuleStore,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a RuleStore, options: ReconcileOptions) -> Self {
        Self { store, options }
    }

    /// Import canonical remote rules for every `ExtraInActual` or
    /// `Modified` drift record.
    ///
    /// `MissingInActual` records are a no-op: desired-but-undeployed is the
    /// expected state before a deploy step, not an error. A failure saving
    /// one rule is recorded and the batch continues.
    pub fn import(
        &self,
        org: &str,
        env: &str,
        records: &[DriftRecord],
        actual: &[CanonicalRule],
        existing_ids: &BTreeSet<String>,
    ) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();
        let mut taken: BTreeSet<String> = existing_ids.clone();

        for record in records {
            match record.kind {
                DriftKind::ExtraInActual | DriftKind::Modified => {}
                DriftKind::MissingInActual | DriftKind::MissingInTarget => continue,
            }

            let Some(rule) = actual.iter().find(|r| r.identifier == record.rule_id) else {
                // Drift records are derived from the actual set, so a miss
                // here means the caller passed mismatched inputs.
                outcome.failures.push(RuleFailure {
                    rule: record.rule_id.clone(),
                    error: "no canonical remote rule for drift record".to_string(),
                });
                continue;
            };

            let name = if record.kind == DriftKind::Modified {
                rule.identifier.clone()
            } else {
                disambiguate(&rule.identifier, |candidate| taken.contains(candidate))
            };
            taken.insert(name.clone());

            if self.options.dry_run {
                outcome
                    .actions
                    .push(format!("[dry-run] Would import '{name}'"));
                continue;
            }

            let definition = to_definition(rule, &name);
            match self.store.save_rule(org, env, &definition, self.options.force) {
                Ok(saved) if saved.changed() => {
                    tracing::info!(rule = %name, "imported rule from remote");
                    outcome.actions.push(format!("Imported '{name}'"));
                }
                Ok(_) => {
                    outcome.actions.push(format!("'{name}' already up to date"));
                }
                Err(e) => {
                    tracing::warn!(rule = %name, error = %e, "failed to import rule");
                    outcome.failures.push(RuleFailure {
                        rule: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        outcome
    }
}

/// Materialize a storable record from a canonical remote rule. The
/// grouping block is written out explicitly since canonicalization has
/// already applied defaults.
fn to_definition(rule: &CanonicalRule, name: &str) -> RuleDefinition {
    RuleDefinition {
        name: name.to_string(),
        display_name: rule.display_name.clone(),
        query_file: format!("{QUERIES_DIR}/{name}.kql"),
        severity: rule.severity,
        enabled: rule.enabled,
        frequency: rule.frequency,
        period: rule.period,
        tactics: rule.tactics.iter().cloned().collect(),
        techniques: rule.techniques.iter().cloned().collect(),
        create_incident: rule.create_incident,
        grouping: Some(GroupingConfig {
            enabled: rule.grouping.enabled,
            matching_method: rule.grouping.matching_method.clone(),
        }),
        entities: rule
            .entities
            .iter()
            .map(|e| drift_store::EntityMapping {
                entity_type: e.entity_type.clone(),
                identifier: e.identifier.clone(),
                column: e.column.clone(),
            })
            .collect(),
        custom_details: rule.custom_details.clone(),
        query_body: rule.query.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{Grouping, RuleSource};
    use crate::diff;
    use drift_store::Severity;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn actual_rule(id: &str, severity: Severity) -> CanonicalRule {
        CanonicalRule {
            identifier: id.to_string(),
            display_name: format!("Rule {id}"),
            query: "SigninLogs | where ResultType != 0".to_string(),
            severity,
            enabled: true,
            frequency: Duration::from_secs(3_600),
            period: Duration::from_secs(3_600),
            tactics: ["CredentialAccess".to_string()].into_iter().collect(),
            techniques: Default::default(),
            create_incident: true,
            grouping: Grouping::default(),
            entities: Default::default(),
            custom_details: Default::default(),
            source: RuleSource::Actual,
        }
    }

    #[test]
    fn imports_extra_rule_and_creates_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();
        let store = RuleStore::new(dir.path());

        let actual = vec![actual_rule("r2", Severity::High)];
        let records = diff::diff(&[], &actual);
        let reconciler = Reconciler::new(&store, ReconcileOptions::default());

        let outcome = reconciler.import("contoso", "dev", &records, &actual, &BTreeSet::new());

        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.actions, vec!["Imported 'r2'"]);

        let loaded = store.load_rules("contoso", "dev").unwrap();
        assert_eq!(loaded.rules.len(), 1);
        assert_eq!(loaded.rules[0].name, "r2");
        assert_eq!(loaded.rules[0].severity, Severity::High);
        assert!(dir.path().join("contoso/dev/queries/r2.kql").exists());
    }

    #[test]
    fn second_import_is_a_no_op() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();
        let store = RuleStore::new(dir.path());

        let actual = vec![actual_rule("r2", Severity::High)];
        let records = diff::diff(&[], &actual);
        let reconciler = Reconciler::new(&store, ReconcileOptions::default());
        reconciler.import("contoso", "dev", &records, &actual, &BTreeSet::new());

        // The next run re-diffs against the reloaded desired state; the
        // imported rule now matches the remote exactly, so no drift record
        // reaches the reconciler and nothing is written.
        let canonicalizer = crate::canonical::Canonicalizer::new();
        let loaded = store.load_rules("contoso", "dev").unwrap();
        let desired: Vec<_> = loaded.rules.iter().map(|r| canonicalizer.from_desired(r)).collect();
        let records = diff::diff(&desired, &actual);
        assert!(records.is_empty());

        let existing: BTreeSet<String> = desired.iter().map(|r| r.identifier.clone()).collect();
        let second = reconciler.import("contoso", "dev", &records, &actual, &existing);
        assert!(second.actions.is_empty());
        assert!(second.failures.is_empty());
    }

    #[test]
    fn missing_in_actual_is_not_imported() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();
        let store = RuleStore::new(dir.path());

        let records = vec![DriftRecord {
            rule_id: "declared-only".to_string(),
            kind: DriftKind::MissingInActual,
            field_diffs: Vec::new(),
        }];
        let reconciler = Reconciler::new(&store, ReconcileOptions::default());

        let outcome = reconciler.import("contoso", "dev", &records, &[], &BTreeSet::new());
        assert!(outcome.actions.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();
        let store = RuleStore::new(dir.path());

        let actual = vec![actual_rule("r2", Severity::High)];
        let records = diff::diff(&[], &actual);
        let reconciler = Reconciler::new(
            &store,
            ReconcileOptions {
                dry_run: true,
                force: false,
            },
        );

        let outcome = reconciler.import("contoso", "dev", &records, &actual, &BTreeSet::new());

        assert_eq!(outcome.actions, vec!["[dry-run] Would import 'r2'"]);
        assert!(!dir.path().join("contoso/dev/rules.yaml").exists());
        assert!(!dir.path().join("contoso/dev/queries").exists());
    }

    #[test]
    fn modified_rule_is_updated_in_place() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();
        let store = RuleStore::new(dir.path());
        let reconciler = Reconciler::new(&store, ReconcileOptions::default());

        // Seed the store with the Low-severity version.
        let actual_low = vec![actual_rule("r4", Severity::Low)];
        let seed = diff::diff(&[], &actual_low);
        reconciler.import("contoso", "dev", &seed, &actual_low, &BTreeSet::new());

        // Remote now reports Medium.
        let loaded = store.load_rules("contoso", "dev").unwrap();
        let canonicalizer = crate::canonical::Canonicalizer::new();
        let desired: Vec<_> = loaded.rules.iter().map(|r| canonicalizer.from_desired(r)).collect();
        let actual_medium = vec![actual_rule("r4", Severity::Medium)];
        let records = diff::diff(&desired, &actual_medium);
        assert_eq!(records[0].kind, DriftKind::Modified);

        let existing: BTreeSet<String> = desired.iter().map(|r| r.identifier.clone()).collect();
        let outcome = reconciler.import("contoso", "dev", &records, &actual_medium, &existing);

        assert_eq!(outcome.actions, vec!["Imported 'r4'"]);
        let reloaded = store.load_rules("contoso", "dev").unwrap();
        assert_eq!(reloaded.rules[0].severity, Severity::Medium);
    }

    #[test]
    fn save_failure_is_recorded_and_batch_continues() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();
        // Block the queries directory with a plain file so writes fail.
        fs::write(dir.path().join("contoso/dev/queries"), "not a dir").unwrap();
        let store = RuleStore::new(dir.path());

        let actual = vec![
            actual_rule("fails", Severity::High),
            actual_rule("also-fails", Severity::Low),
        ];
        let records = diff::diff(&[], &actual);
        let reconciler = Reconciler::new(&store, ReconcileOptions::default());

        let outcome = reconciler.import("contoso", "dev", &records, &actual, &BTreeSet::new());

        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome.actions.is_empty());
    }
}
