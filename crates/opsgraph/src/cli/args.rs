//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation.

use clap::Parser;

use super::types::{RiskRuleArg, SeverityArg};

/// Arguments for the `sweep` command
#[derive(Parser, Debug, Clone)]
pub struct SweepArgs {
    /// Suppress the human-readable summary
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `watch` command
#[derive(Parser, Debug, Clone)]
pub struct WatchArgs {
    /// Seconds between scheduled sweeps
    #[arg(long, default_value = "300", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_secs: u64,
}

/// Arguments for the `impact` command
#[derive(Parser, Debug, Clone)]
pub struct ImpactArgs {
    /// Work unit the delay lands on
    pub work_unit_id: String,

    /// Delay to project, in days
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(i64).range(1..))]
    pub delay_days: i64,
}

/// Arguments for the `risks` command
#[derive(Parser, Debug, Clone)]
pub struct RisksArgs {
    /// Filter by severity
    #[arg(short, long, value_enum)]
    pub severity: Option<SeverityArg>,

    /// Filter by detecting rule
    #[arg(short, long, value_enum)]
    pub rule: Option<RiskRuleArg>,

    /// Filter by project
    #[arg(short, long)]
    pub project: Option<String>,
}

/// Arguments for the `at-risk` command
#[derive(Parser, Debug, Clone)]
pub struct AtRiskArgs {
    /// Lookahead window for approaching deadlines, in days
    #[arg(short, long, default_value = "7", value_parser = clap::value_parser!(i64).range(0..))]
    pub days: i64,
}
