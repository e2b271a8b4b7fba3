//! Reconcile command implementation

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use tokio_util::sync::CancellationToken;

use drift_core::{DriftEngine, DriftReport, ReconcileOptions};
use drift_remote::{HttpRemoteClient, RemoteSettings};
use drift_store::RuleStore;

use crate::cli::ModeArg;
use crate::error::{CliError, Result};

/// Default settings file name at the store root
const SETTINGS_FILE: &str = "ruledrift.toml";

pub struct ReconcileParams {
    pub org: String,
    pub env: String,
    pub mode: ModeArg,
    pub target_env: Option<String>,
    pub dry_run: bool,
    pub force: bool,
    pub json: bool,
    pub store: PathBuf,
    pub config: Option<PathBuf>,
}

/// Run one reconcile invocation and return the process exit code.
pub async fn run_reconcile(params: ReconcileParams, cancel: CancellationToken) -> Result<i32> {
    let store = RuleStore::new(&params.store);

    let report = match params.mode {
        ModeArg::Import => {
            let engine = DriftEngine::new(store, Arc::new(build_client(&params)?));
            let options = ReconcileOptions {
                dry_run: params.dry_run,
                force: params.force,
            };
            engine
                .run_import(&params.org, &params.env, options, &cancel)
                .await?
        }
        ModeArg::PromotionCheck => {
            let target = params.target_env.as_deref().ok_or_else(|| {
                CliError::user("--target-env is required with --mode promotion-check")
            })?;
            let engine = DriftEngine::offline(store);
            engine
                .run_promotion_check(&params.org, &params.env, target, &cancel)
                .await?
        }
    };

    emit(&report, params.json)?;
    Ok(exit_code(&params.mode, &report))
}

fn build_client(params: &ReconcileParams) -> Result<HttpRemoteClient> {
    let settings_path = params
        .config
        .clone()
        .unwrap_or_else(|| params.store.join(SETTINGS_FILE));
    let settings = RemoteSettings::load(&settings_path)?;
    Ok(HttpRemoteClient::new(settings)?)
}

fn emit(report: &DriftReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.render_jsonl()?);
        return Ok(());
    }

    print!("{}", report.render_text());

    let summary = report.summary();
    if report.has_failures() {
        println!(
            "{} {} rule(s) failed or were skipped.",
            "PARTIAL".yellow().bold(),
            summary.skipped + summary.failed
        );
    } else if report.has_drift() {
        println!("{} Drift detected.", "DRIFT".yellow().bold());
    } else {
        println!("{} No drift detected.", "OK".green().bold());
    }

    Ok(())
}

fn exit_code(mode: &ModeArg, report: &DriftReport) -> i32 {
    if report.has_failures() {
        2
    } else if *mode == ModeArg::PromotionCheck && report.has_drift() {
        1
    } else {
        0
    }
}
