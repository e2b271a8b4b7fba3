//! Desired-state rule storage
//!
//! This crate owns the on-disk representation of rule fleets: one directory
//! per environment under an organization root, holding a YAML rule
//! collection and a sibling directory of query bodies. Writes are atomic
//! and content-idempotent; loads tolerate individually malformed records.

pub mod duration;
mod error;
mod io;
mod layout;
mod rule;
mod store;

pub use error::{Error, Result};
pub use io::{content_checksum, read_text, write_atomic};
pub use layout::{QUERIES_DIR, RULES_FILE, StoreLayout};
pub use rule::{EntityMapping, GroupingConfig, RuleDefinition, Severity};
pub use store::{LoadOutcome, RuleStore, SaveOutcome, SkippedRule};
