//! Remote rule-service access
//!
//! Fetches the actual deployed rule set for an (organization, environment)
//! pair: paginated listing, per-rule detail backfill, bearer auth, bounded
//! retry. No business logic lives here; records come back provider-shaped.

mod client;
mod error;
mod model;
mod retry;
mod settings;

pub use client::{HttpRemoteClient, RemoteApi};
pub use error::{Error, Result};
pub use model::{
    RemoteGroupingConfiguration, RemoteIncidentConfiguration, RemoteRule, RulePage,
};
pub use retry::RetryPolicy;
pub use settings::RemoteSettings;
