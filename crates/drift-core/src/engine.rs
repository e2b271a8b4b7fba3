//! Phase orchestration
//!
//! [`DriftEngine`] runs one invocation strictly in sequence: load desired →
//! fetch actual → detail backfill → canonicalize → diff → reconcile. Each
//! phase needs the complete output of the previous one, so there is no
//! streaming. A cancellation token is checked between phases and wraps
//! every remote call; import writes only start after all remote data has
//! been fetched and canonicalized, so cancellation never leaves the store
//! half-written.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use drift_remote::{RemoteApi, RemoteRule};
use drift_store::RuleStore;

use crate::canonical::{CanonicalRule, Canonicalizer};
use crate::diff;
use crate::reconcile::{ReconcileMode, ReconcileOptions, Reconciler, RuleFailure};
use crate::report::DriftReport;
use crate::slug::disambiguate;
use crate::{Error, Result};

/// In-flight ceiling for per-rule detail fetches. The remote service is
/// rate-limited externally, so this stays small.
const DEFAULT_DETAIL_CONCURRENCY: usize = 4;

/// The drift-detection and reconciliation pipeline.
pub struct DriftEngine {
    store: RuleStore,
    /// Absent for offline engines; promotion-check never touches the remote
    remote: Option<Arc<dyn RemoteApi>>,
    canonicalizer: Canonicalizer,
    detail_concurrency: usize,
}

impl DriftEngine {
    pub fn new(store: RuleStore, remote: Arc<dyn RemoteApi>) -> Self {
        Self {
            store,
            remote: Some(remote),
            canonicalizer: Canonicalizer::new(),
            detail_concurrency: DEFAULT_DETAIL_CONCURRENCY,
        }
    }

    /// Build an engine with no remote access. Import mode fails with
    /// [`Error::RemoteRequired`]; promotion-check works normally.
    pub fn offline(store: RuleStore) -> Self {
        Self {
            store,
            remote: None,
            canonicalizer: Canonicalizer::new(),
            detail_concurrency: DEFAULT_DETAIL_CONCURRENCY,
        }
    }

    pub fn with_detail_concurrency(mut self, concurrency: usize) -> Self {
        self.detail_concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// Import mode: pull remote edits back into the desired-state store.
    pub async fn run_import(
        &self,
        org: &str,
        env: &str,
        options: ReconcileOptions,
        cancel: &CancellationToken,
    ) -> Result<DriftReport> {
        let remote = self.remote.as_deref().ok_or(Error::RemoteRequired)?;

        ensure_active(cancel)?;
        let load = self.store.load_rules(org, env)?;
        let desired: Vec<CanonicalRule> = load
            .rules
            .iter()
            .map(|r| self.canonicalizer.from_desired(r))
            .collect();
        tracing::debug!(org, env, count = desired.len(), "loaded desired rules");

        ensure_active(cancel)?;
        let fetched = run_cancellable(cancel, remote.fetch_rules(org, env)).await??;

        ensure_active(cancel)?;
        let (detailed, mut failures) = self
            .backfill_details(remote, org, env, fetched, cancel)
            .await?;

        let mut actual = Vec::new();
        for rule in &detailed {
            match self.canonicalizer.from_remote(rule) {
                Ok(canonical) => actual.push(canonical),
                Err(e) => {
                    tracing::warn!(rule = %rule.display_name, error = %e, "skipping remote rule");
                    failures.push(RuleFailure {
                        rule: rule.display_name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        assign_unique_identifiers(&mut actual);

        ensure_active(cancel)?;
        let records = diff::diff(&desired, &actual);

        ensure_active(cancel)?;
        let existing: BTreeSet<String> = desired.iter().map(|r| r.identifier.clone()).collect();
        let reconciler = Reconciler::new(&self.store, options);
        let outcome = reconciler.import(org, env, &records, &actual, &existing);
        failures.extend(outcome.failures);

        Ok(DriftReport {
            org: org.to_string(),
            env: env.to_string(),
            target_env: None,
            mode: ReconcileMode::Import,
            records,
            skipped: load.skipped,
            failures,
            actions: outcome.actions,
            generated_at: Utc::now(),
        })
    }

    /// Promotion-check mode: read-only comparison of two environments'
    /// desired state. Rules present in the source environment but absent
    /// from the target are flagged; nothing is ever written.
    pub async fn run_promotion_check(
        &self,
        org: &str,
        source_env: &str,
        target_env: &str,
        cancel: &CancellationToken,
    ) -> Result<DriftReport> {
        ensure_active(cancel)?;
        let source = self.store.load_rules(org, source_env)?;
        ensure_active(cancel)?;
        let target = self.store.load_rules(org, target_env)?;

        let source_rules: Vec<CanonicalRule> = source
            .rules
            .iter()
            .map(|r| self.canonicalizer.from_desired(r))
            .collect();
        let target_rules: Vec<CanonicalRule> = target
            .rules
            .iter()
            .map(|r| self.canonicalizer.from_desired(r))
            .collect();

        let records = diff::promotion_gap(&source_rules, &target_rules);

        let mut skipped = Vec::new();
        for s in source.skipped {
            skipped.push(drift_store::SkippedRule {
                name: format!("{source_env}/{}", s.name),
                reason: s.reason,
            });
        }
        for s in target.skipped {
            skipped.push(drift_store::SkippedRule {
                name: format!("{target_env}/{}", s.name),
                reason: s.reason,
            });
        }

        Ok(DriftReport {
            org: org.to_string(),
            env: source_env.to_string(),
            target_env: Some(target_env.to_string()),
            mode: ReconcileMode::PromotionCheck,
            records,
            skipped,
            failures: Vec::new(),
            actions: Vec::new(),
            generated_at: Utc::now(),
        })
    }

    /// Fetch per-rule detail for every record the list endpoint returned
    /// incomplete, with bounded concurrency. A detail failure skips that
    /// rule; a fatal error (auth) aborts the run.
    async fn backfill_details(
        &self,
        remote: &dyn RemoteApi,
        org: &str,
        env: &str,
        rules: Vec<RemoteRule>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<RemoteRule>, Vec<RuleFailure>)> {
        let (need, mut complete): (Vec<_>, Vec<_>) =
            rules.into_iter().partition(RemoteRule::needs_detail);
        if need.is_empty() {
            return Ok((complete, Vec::new()));
        }
        tracing::debug!(org, env, count = need.len(), "backfilling rule details");

        let fetches = futures::stream::iter(need.into_iter().map(|rule| async move {
            match remote.fetch_rule_detail(org, env, &rule.id).await {
                Ok(detail) => Ok(detail),
                Err(e) => Err((rule, e)),
            }
        }))
        .buffer_unordered(self.detail_concurrency)
        .collect::<Vec<_>>();

        let results = run_cancellable(cancel, fetches).await?;

        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(detail) => complete.push(detail),
                Err((_, e)) if e.is_fatal() => return Err(e.into()),
                Err((rule, e)) => {
                    tracing::warn!(rule = %rule.display_name, error = %e, "detail fetch failed");
                    failures.push(RuleFailure {
                        rule: rule.display_name,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok((complete, failures))
    }
}

/// Resolve duplicate derived identifiers within one collection by numeric
/// suffix, in input order.
fn assign_unique_identifiers(rules: &mut [CanonicalRule]) {
    let mut taken = BTreeSet::new();
    for rule in rules.iter_mut() {
        let unique = disambiguate(&rule.identifier, |candidate| taken.contains(candidate));
        taken.insert(unique.clone());
        rule.identifier = unique;
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Canceled)
    } else {
        Ok(())
    }
}

async fn run_cancellable<F>(cancel: &CancellationToken, future: F) -> Result<F::Output>
where
    F: Future,
{
    match cancel.run_until_cancelled(future).await {
        Some(output) => Ok(output),
        None => Err(Error::Canceled),
    }
}
