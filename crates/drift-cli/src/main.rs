//! ruledrift CLI
//!
//! The command-line interface for drift detection and reconciliation of
//! detection-rule fleets.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use commands::ReconcileParams;
use error::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Some(cmd) => execute_command(cmd).await,
        None => {
            // No command provided - show help hint
            println!("{} Detection-rule drift manager", "ruledrift".green().bold());
            println!();
            println!("Run {} for available commands.", "ruledrift --help".cyan());
            Ok(0)
        }
    }
}

async fn execute_command(cmd: Commands) -> Result<i32> {
    match cmd {
        Commands::Reconcile {
            org,
            env,
            mode,
            target_env,
            dry_run,
            force,
            json,
            store,
            config,
        } => {
            let params = ReconcileParams {
                org,
                env,
                mode,
                target_env,
                dry_run,
                force,
                json,
                store,
                config,
            };
            commands::run_reconcile(params, cancel_on_ctrl_c()).await
        }
        Commands::Environments { org, store } => commands::run_environments(&store, &org),
    }
}

/// A token canceled when the process receives Ctrl-C, threaded through the
/// whole pipeline so a mid-flight interrupt leaves the store untouched.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, canceling");
            signal_token.cancel();
        }
    });
    token
}
