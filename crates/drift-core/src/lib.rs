//! Drift detection and reconciliation engine
//!
//! Loads desired-state rules, fetches the deployed set, projects both into
//! one canonical schema, computes a structured diff, and reconciles in two
//! directions: importing remote edits back into the store, or flagging
//! rules that have not yet been promoted to a target environment.

mod canonical;
mod diff;
mod engine;
mod error;
mod reconcile;
mod report;
mod slug;

pub use canonical::{CanonicalRule, Canonicalizer, EntityRef, Grouping, RuleSource};
pub use diff::{DriftKind, DriftRecord, FieldDiff, diff, promotion_gap};
pub use engine::DriftEngine;
pub use error::{Error, Result};
pub use reconcile::{ImportOutcome, ReconcileMode, ReconcileOptions, Reconciler, RuleFailure};
pub use report::{DriftReport, DriftSummary};
pub use slug::{NamingStrategy, SlugNaming, disambiguate, slugify};
