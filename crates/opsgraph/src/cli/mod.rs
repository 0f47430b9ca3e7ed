//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for opsgraph using
//! clap's derive API. Every command operates on the JSONL snapshot named
//! by `--data` (default `opsgraph.jsonl`), loading it up front and
//! writing it back after mutating commands.
//!
//! # Commands
//!
//! - `sweep`: Run one early warning sweep
//! - `watch`: Run sweeps on an interval until interrupted
//! - `impact`: Project a delay through a unit's dependency graph
//! - `risks`: List open risk events
//! - `at-risk`: List work units needing attention now
//!
//! # Global Flags
//!
//! - `--data`: Path to the JSONL snapshot
//! - `--config`: Path to a YAML file overriding engine thresholds
//! - `--json`: Output in JSON format (applies to all commands)
//!
//! # Example
//!
//! ```bash
//! opsgraph --data ops.jsonl sweep
//! opsgraph --data ops.jsonl risks --severity critical
//! opsgraph --data ops.jsonl impact wu-x7f2 --delay-days 3
//! ```

mod args;
mod execute;
mod types;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use args::{AtRiskArgs, ImpactArgs, RisksArgs, SweepArgs, WatchArgs};
pub use types::{RiskRuleArg, SeverityArg};

/// How command results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text
    Text,
    /// JSON for programmatic use
    Json,
}

/// Opsgraph - predictive operations control
///
/// Track work units, dependencies, and resource capacity; project delay
/// impact; and sweep for early warning risk events. State lives in a
/// JSONL snapshot for easy version control integration.
#[derive(Parser, Debug)]
#[command(name = "opsgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the JSONL snapshot file
    #[arg(long, global = true, default_value = "opsgraph.jsonl")]
    pub data: PathBuf,

    /// Path to a YAML config file overriding engine thresholds
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run one early warning sweep
    ///
    /// Evaluates every rule against the snapshot, reconciles open risk
    /// events, and writes the snapshot back.
    Sweep(SweepArgs),

    /// Run sweeps on a fixed interval until interrupted
    ///
    /// Keeps sweeping every `--interval-secs` seconds. Ctrl-C stops the
    /// loop after the current tick.
    Watch(WatchArgs),

    /// Project a delay through a work unit's dependency graph
    ///
    /// Shows every downstream unit whose schedule would move, with the
    /// unabsorbed delay and shifted dates.
    Impact(ImpactArgs),

    /// List open risk events, most severe first
    Risks(RisksArgs),

    /// List work units needing attention right now
    ///
    /// Flags units that are late to start, due within the lookahead
    /// window, or blocked.
    #[command(name = "at-risk")]
    AtRisk(AtRiskArgs),
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Execute the parsed command
    pub async fn execute(self) -> Result<()> {
        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let mut control = execute::open_control(&self.data, self.config.as_deref()).await?;

        match &self.command {
            Commands::Sweep(a) => execute::execute_sweep(&mut control, a, output_mode).await,
            Commands::Watch(a) => execute::execute_watch(control, a).await,
            Commands::Impact(a) => execute::execute_impact(&control, a, output_mode).await,
            Commands::Risks(a) => execute::execute_risks(&control, a, output_mode).await,
            Commands::AtRisk(a) => execute::execute_at_risk(&control, a, output_mode).await,
        }
    }
}
