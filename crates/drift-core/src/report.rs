//! Drift report rendering
//!
//! One report type, two renderings: a human-readable summary with
//! field-level before/after values (query changes as a unified diff), and
//! a machine-readable line-per-record form for downstream automation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use similar::TextDiff;

use drift_store::SkippedRule;

use crate::diff::{DriftKind, DriftRecord};
use crate::reconcile::{ReconcileMode, RuleFailure};

/// Aggregate counts for the summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriftSummary {
    pub missing_in_actual: usize,
    pub extra_in_actual: usize,
    pub modified: usize,
    pub promotion_gaps: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of one reconcile invocation.
#[derive(Debug)]
pub struct DriftReport {
    pub org: String,
    pub env: String,
    /// Set in promotion-check mode
    pub target_env: Option<String>,
    pub mode: ReconcileMode,
    pub records: Vec<DriftRecord>,
    pub skipped: Vec<SkippedRule>,
    pub failures: Vec<RuleFailure>,
    pub actions: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl DriftReport {
    pub fn summary(&self) -> DriftSummary {
        let count = |kind: DriftKind| self.records.iter().filter(|r| r.kind == kind).count();
        DriftSummary {
            missing_in_actual: count(DriftKind::MissingInActual),
            extra_in_actual: count(DriftKind::ExtraInActual),
            modified: count(DriftKind::Modified),
            promotion_gaps: count(DriftKind::MissingInTarget),
            skipped: self.skipped.len(),
            failed: self.failures.len(),
        }
    }

    pub fn has_drift(&self) -> bool {
        !self.records.is_empty()
    }

    /// Whether any rule-level error occurred, even if most rules succeeded.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || !self.skipped.is_empty()
    }

    /// Render the human-readable report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let scope = match &self.target_env {
            Some(target) => format!("{}/{} -> {}", self.org, self.env, target),
            None => format!("{}/{}", self.org, self.env),
        };
        let mode = match self.mode {
            ReconcileMode::Import => "import",
            ReconcileMode::PromotionCheck => "promotion-check",
        };
        out.push_str(&format!("Reconcile report for {scope} ({mode})\n"));

        let summary = self.summary();
        out.push_str(&format!(
            "Summary: {} missing, {} extra, {} modified, {} promotion gaps, {} skipped, {} failed\n",
            summary.missing_in_actual,
            summary.extra_in_actual,
            summary.modified,
            summary.promotion_gaps,
            summary.skipped,
            summary.failed,
        ));

        for record in &self.records {
            out.push('\n');
            out.push_str(&render_record(record));
        }

        if !self.skipped.is_empty() {
            out.push_str("\nSkipped records:\n");
            for s in &self.skipped {
                out.push_str(&format!("  - {}: {}\n", s.name, s.reason));
            }
        }

        if !self.failures.is_empty() {
            out.push_str("\nFailed rules:\n");
            for f in &self.failures {
                out.push_str(&format!("  - {}: {}\n", f.rule, f.error));
            }
        }

        if !self.actions.is_empty() {
            out.push_str("\nActions:\n");
            for action in &self.actions {
                out.push_str(&format!("  - {action}\n"));
            }
        }

        out
    }

    /// Render the machine-readable form: one JSON record per line, a
    /// summary record first.
    pub fn render_jsonl(&self) -> serde_json::Result<String> {
        let mut lines = Vec::new();

        lines.push(serde_json::to_string(&serde_json::json!({
            "record": "summary",
            "org": self.org,
            "env": self.env,
            "target_env": self.target_env,
            "mode": self.mode,
            "generated_at": self.generated_at.to_rfc3339(),
            "counts": self.summary(),
        }))?);

        for record in &self.records {
            let mut value = serde_json::to_value(record)?;
            value["record"] = "drift".into();
            lines.push(serde_json::to_string(&value)?);
        }
        for skipped in &self.skipped {
            let mut value = serde_json::to_value(skipped)?;
            value["record"] = "skipped".into();
            lines.push(serde_json::to_string(&value)?);
        }
        for failure in &self.failures {
            let mut value = serde_json::to_value(failure)?;
            value["record"] = "failure".into();
            lines.push(serde_json::to_string(&value)?);
        }

        Ok(lines.join("\n"))
    }
}

fn render_record(record: &DriftRecord) -> String {
    let label = match record.kind {
        DriftKind::MissingInActual => "missing in actual",
        DriftKind::ExtraInActual => "extra in actual",
        DriftKind::Modified => "modified",
        DriftKind::MissingInTarget => "missing in target",
    };
    let mut out = format!("'{}': {}\n", record.rule_id, label);

    for diff in &record.field_diffs {
        if diff.field == "query" {
            out.push_str("  query:\n");
            let text_diff = TextDiff::from_lines(diff.desired.as_str(), diff.actual.as_str());
            for line in text_diff
                .unified_diff()
                .context_radius(2)
                .to_string()
                .lines()
            {
                out.push_str(&format!("    {line}\n"));
            }
        } else {
            out.push_str(&format!(
                "  {}: {} -> {}\n",
                diff.field, diff.desired, diff.actual
            ));
        }
    }

    out
}
