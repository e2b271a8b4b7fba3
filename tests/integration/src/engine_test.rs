//! End-to-end engine tests against a temp store and an in-process fake
//! remote service.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use drift_core::{DriftEngine, DriftKind, ReconcileOptions};
use drift_remote::{RemoteApi, RemoteRule};
use drift_store::RuleStore;

struct FakeRemote {
    listing: Vec<RemoteRule>,
    details: HashMap<String, RemoteRule>,
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn fetch_rules(&self, org: &str, env: &str) -> drift_remote::Result<Vec<RemoteRule>> {
        if org != "contoso" || env != "dev" {
            return Err(drift_remote::Error::EnvironmentNotFound {
                org: org.to_string(),
                env: env.to_string(),
            });
        }
        Ok(self.listing.clone())
    }

    async fn fetch_rule_detail(
        &self,
        _org: &str,
        _env: &str,
        rule_id: &str,
    ) -> drift_remote::Result<RemoteRule> {
        self.details
            .get(rule_id)
            .cloned()
            .ok_or_else(|| drift_remote::Error::transient("detail endpoint unavailable"))
    }
}

fn remote_rule(id: &str, display_name: &str, severity: &str) -> RemoteRule {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "displayName": display_name,
        "severity": severity,
        "enabled": true,
        "query": "SigninLogs | where ResultType != 0 | summarize count() by UserPrincipalName",
        "queryFrequency": "PT1H",
        "queryPeriod": "1:00:00",
        "tactics": ["CredentialAccess"],
        "techniques": ["T1110"],
        "entityMappings": [
            {"entityType": "Account", "fieldMappings": [
                {"identifier": "FullName", "columnName": "UserPrincipalName"}
            ]}
        ],
        "incidentConfiguration": {"createIncident": true}
    }))
    .unwrap()
}

fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

fn engine(root: &Path, remote: FakeRemote) -> DriftEngine {
    DriftEngine::new(RuleStore::new(root), Arc::new(remote))
}

#[tokio::test]
async fn import_then_reimport_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();

    let listing = vec![remote_rule("1", "Failed Logins Burst", "High")];
    let first = engine(
        dir.path(),
        FakeRemote {
            listing: listing.clone(),
            details: HashMap::new(),
        },
    )
    .run_import(
        "contoso",
        "dev",
        ReconcileOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(first.summary().extra_in_actual, 1);
    assert_eq!(first.actions, vec!["Imported 'failed-logins-burst'"]);

    let rules_file = dir.path().join("contoso/dev/rules.yaml");
    let query_file = dir.path().join("contoso/dev/queries/failed-logins-burst.kql");
    assert!(rules_file.exists());
    assert!(query_file.exists());

    let rules_mtime = mtime(&rules_file);
    let query_mtime = mtime(&query_file);
    std::thread::sleep(std::time::Duration::from_millis(25));

    // No intervening remote change: the reloaded desired state matches the
    // re-fetched actual exactly, so the second run computes no drift and
    // takes no action.
    let second = engine(
        dir.path(),
        FakeRemote {
            listing,
            details: HashMap::new(),
        },
    )
    .run_import(
        "contoso",
        "dev",
        ReconcileOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(!second.has_drift());
    assert!(second.actions.is_empty());
    assert!(!second.has_failures());
    assert_eq!(mtime(&rules_file), rules_mtime);
    assert_eq!(mtime(&query_file), query_mtime);
}

#[tokio::test]
async fn import_reflects_remote_severity_change() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();

    engine(
        dir.path(),
        FakeRemote {
            listing: vec![remote_rule("1", "Odd Hours Access", "Low")],
            details: HashMap::new(),
        },
    )
    .run_import("contoso", "dev", ReconcileOptions::default(), &CancellationToken::new())
    .await
    .unwrap();

    // Severity changed remotely; the next import classifies Modified and
    // rewrites the record.
    let report = engine(
        dir.path(),
        FakeRemote {
            listing: vec![remote_rule("1", "Odd Hours Access", "Medium")],
            details: HashMap::new(),
        },
    )
    .run_import("contoso", "dev", ReconcileOptions::default(), &CancellationToken::new())
    .await
    .unwrap();

    assert_eq!(report.summary().modified, 1);
    let record = &report.records[0];
    assert_eq!(record.kind, DriftKind::Modified);
    assert_eq!(record.field_diffs.len(), 1);
    assert_eq!(record.field_diffs[0].field, "severity");
    assert_eq!(record.field_diffs[0].desired, "Low");
    assert_eq!(record.field_diffs[0].actual, "Medium");

    let store = RuleStore::new(dir.path());
    let loaded = store.load_rules("contoso", "dev").unwrap();
    assert_eq!(loaded.rules[0].severity, drift_store::Severity::Medium);
}

#[tokio::test]
async fn equivalent_durations_do_not_report_drift() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();

    // First import stores frequency as PT1H; the remote keeps reporting
    // the clock-time form. Both resolve to the same duration.
    let listing = vec![remote_rule("1", "Stable Rule", "High")];
    engine(dir.path(), FakeRemote { listing: listing.clone(), details: HashMap::new() })
        .run_import("contoso", "dev", ReconcileOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let report = engine(dir.path(), FakeRemote { listing, details: HashMap::new() })
        .run_import("contoso", "dev", ReconcileOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary().modified, 0);
    assert!(!report.has_drift());
}

#[tokio::test]
async fn dry_run_leaves_no_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();

    let report = engine(
        dir.path(),
        FakeRemote {
            listing: vec![remote_rule("1", "Previewed Rule", "High")],
            details: HashMap::new(),
        },
    )
    .run_import(
        "contoso",
        "dev",
        ReconcileOptions {
            dry_run: true,
            force: false,
        },
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.actions, vec!["[dry-run] Would import 'previewed-rule'"]);
    assert!(!dir.path().join("contoso/dev/rules.yaml").exists());
}

#[tokio::test]
async fn missing_remote_environment_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contoso/staging")).unwrap();

    let err = engine(
        dir.path(),
        FakeRemote {
            listing: Vec::new(),
            details: HashMap::new(),
        },
    )
    .run_import("contoso", "staging", ReconcileOptions::default(), &CancellationToken::new())
    .await
    .unwrap_err();

    assert!(err.is_fatal());
}

#[tokio::test]
async fn promotion_check_is_read_only_and_existence_based() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();
    fs::create_dir_all(dir.path().join("contoso/prod")).unwrap();

    // Seed dev with two rules.
    engine(
        dir.path(),
        FakeRemote {
            listing: vec![
                remote_rule("1", "Rule One", "High"),
                remote_rule("2", "Rule Two", "Low"),
            ],
            details: HashMap::new(),
        },
    )
    .run_import("contoso", "dev", ReconcileOptions::default(), &CancellationToken::new())
    .await
    .unwrap();

    // Promote rule-one to prod, with a different severity than dev.
    let store = RuleStore::new(dir.path());
    let dev = store.load_rules("contoso", "dev").unwrap();
    let mut promoted = dev.rules.iter().find(|r| r.name == "rule-one").unwrap().clone();
    promoted.severity = drift_store::Severity::Critical;
    store.save_rule("contoso", "prod", &promoted, false).unwrap();

    let prod_rules_before = fs::read_to_string(dir.path().join("contoso/prod/rules.yaml")).unwrap();

    let report = DriftEngine::offline(RuleStore::new(dir.path()))
        .run_promotion_check("contoso", "dev", "prod", &CancellationToken::new())
        .await
        .unwrap();

    // Only rule-two is a gap; the severity difference on rule-one is not.
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].rule_id, "rule-two");
    assert_eq!(report.records[0].kind, DriftKind::MissingInTarget);

    // Nothing was written.
    let prod_rules_after = fs::read_to_string(dir.path().join("contoso/prod/rules.yaml")).unwrap();
    assert_eq!(prod_rules_before, prod_rules_after);
}

#[tokio::test]
async fn detail_backfill_feeds_entity_mappings_into_the_store() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("contoso/dev")).unwrap();

    let mut listed = remote_rule("1", "Legacy Mapped", "High");
    listed.entity_mappings = None;
    let mut detail = remote_rule("1", "Legacy Mapped", "High");
    detail.entity_mappings = Some(serde_json::json!({
        "accountCustomEntity": "UserName",
        "ipCustomEntity": "ClientIP"
    }));

    let mut details = HashMap::new();
    details.insert("1".to_string(), detail);

    engine(dir.path(), FakeRemote { listing: vec![listed], details })
        .run_import("contoso", "dev", ReconcileOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let loaded = RuleStore::new(dir.path()).load_rules("contoso", "dev").unwrap();
    let entities = &loaded.rules[0].entities;
    assert_eq!(entities.len(), 2);
    assert!(entities.iter().any(|e| e.entity_type == "Account" && e.column == "UserName"));
    assert!(entities.iter().any(|e| e.entity_type == "IP" && e.column == "ClientIP"));
}
