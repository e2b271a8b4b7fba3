//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// ruledrift - Drift detection and reconciliation for detection-rule fleets
#[derive(Parser, Debug)]
#[command(name = "ruledrift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Reconciliation direction for one invocation
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Pull remote edits back into the desired-state store
    Import,
    /// Flag rules present in this environment but absent from the target
    PromotionCheck,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Detect drift between desired and actual state and reconcile it
    ///
    /// Exit codes: 0 = no drift and no errors, 1 = promotion gaps
    /// detected or an unrecoverable error, 2 = partial failure (some
    /// rules failed, others succeeded).
    Reconcile {
        /// Organization name
        #[arg(long)]
        org: String,

        /// Environment name (the source environment in promotion-check mode)
        #[arg(long)]
        env: String,

        /// Reconciliation mode
        #[arg(long, value_enum)]
        mode: ModeArg,

        /// Target environment for promotion-check mode
        #[arg(long)]
        target_env: Option<String>,

        /// Report intended writes without touching the store
        #[arg(long)]
        dry_run: bool,

        /// Rewrite records and query bodies even when content is unchanged
        #[arg(long)]
        force: bool,

        /// Emit the machine-readable line-per-record form on stdout
        #[arg(long)]
        json: bool,

        /// Store root directory
        #[arg(long, default_value = ".")]
        store: PathBuf,

        /// Remote settings file (defaults to <store>/ruledrift.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List environments declared for an organization
    Environments {
        /// Organization name
        #[arg(long)]
        org: String,

        /// Store root directory
        #[arg(long, default_value = ".")]
        store: PathBuf,
    },
}
