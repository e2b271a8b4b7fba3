//! Command implementations

mod environments;
mod reconcile;

pub use environments::run_environments;
pub use reconcile::{ReconcileParams, run_reconcile};
