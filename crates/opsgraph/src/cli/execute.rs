//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands. Every
//! command opens the snapshot into an [`OpsControl`] first; mutating
//! commands save it back when they succeed.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::Mutex;

use super::args::{AtRiskArgs, ImpactArgs, RisksArgs, SweepArgs, WatchArgs};
use super::OutputMode;
use crate::app::OpsControl;
use crate::config::EngineConfig;
use crate::domain::{ProjectId, RiskEventFilter, WorkUnitId};
use crate::scheduler::SweepScheduler;
use crate::storage::StorageBackend;

/// Open the snapshot and config into a control facade.
pub async fn open_control(data: &Path, config: Option<&Path>) -> Result<OpsControl> {
    let config = match config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    OpsControl::open(StorageBackend::Jsonl(data.to_path_buf()), config)
        .await
        .with_context(|| format!("failed to open snapshot {}", data.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Execute the sweep command
pub async fn execute_sweep(
    control: &mut OpsControl,
    args: &SweepArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let outcome = control.run_sweep().await?;
    if !outcome.skipped {
        control.save().await?;
    }

    match output_mode {
        OutputMode::Json => print_json(&outcome)?,
        OutputMode::Text => {
            if !args.quiet {
                if outcome.skipped {
                    println!("Sweep already in flight, nothing done");
                } else {
                    println!(
                        "Sweep complete: {} created, {} updated, {} resolved",
                        outcome.created, outcome.updated, outcome.resolved
                    );
                }
            }
        }
    }

    Ok(())
}

/// Execute the watch command
pub async fn execute_watch(control: OpsControl, args: &WatchArgs) -> Result<()> {
    let control = Arc::new(Mutex::new(control));
    let (scheduler, shutdown) =
        SweepScheduler::new(Arc::clone(&control), Duration::from_secs(args.interval_secs));

    let handle = tokio::spawn(scheduler.run());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    // Receiver may already be gone if the loop stopped on its own
    let _ = shutdown.send(true);

    handle.await.context("sweep scheduler task panicked")?;
    Ok(())
}

/// Execute the impact command
pub async fn execute_impact(
    control: &OpsControl,
    args: &ImpactArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let id = WorkUnitId::from(args.work_unit_id.as_str());
    let impacts = control.get_delay_impact(&id, args.delay_days).await?;

    match output_mode {
        OutputMode::Json => print_json(&impacts)?,
        OutputMode::Text => {
            if impacts.is_empty() {
                println!(
                    "A {} day delay on {} does not move any downstream unit",
                    args.delay_days, args.work_unit_id
                );
            } else {
                println!(
                    "A {} day delay on {} moves {} unit(s):",
                    args.delay_days,
                    args.work_unit_id,
                    impacts.len()
                );
                for impact in &impacts {
                    println!(
                        "  {}  +{}d  {} -> {}",
                        impact.work_unit_id,
                        impact.projected_delay_days,
                        impact.new_planned_start,
                        impact.new_planned_finish
                    );
                }
            }
        }
    }

    Ok(())
}

/// Execute the risks command
pub async fn execute_risks(
    control: &OpsControl,
    args: &RisksArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let filter = RiskEventFilter {
        severity: args.severity.map(Into::into),
        rule: args.rule.map(Into::into),
        project_id: args.project.as_deref().map(ProjectId::from),
    };
    let events = control.list_active_risk_events(&filter).await?;

    match output_mode {
        OutputMode::Json => print_json(&events)?,
        OutputMode::Text => {
            if events.is_empty() {
                println!("No open risk events");
            } else {
                println!("{} open risk event(s):", events.len());
                for event in &events {
                    println!(
                        "  [{:<8}] {:<21} {}  (project {}, last seen {})",
                        event.severity.to_string(),
                        event.rule.as_str(),
                        event.title,
                        event.project_id,
                        event.last_seen_at.format("%Y-%m-%d %H:%M"),
                    );
                }
            }
        }
    }

    Ok(())
}

/// Execute the at-risk command
pub async fn execute_at_risk(
    control: &OpsControl,
    args: &AtRiskArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let at_risk = control.get_at_risk_work_units(args.days).await?;

    match output_mode {
        OutputMode::Json => print_json(&at_risk)?,
        OutputMode::Text => {
            if at_risk.is_empty() {
                println!("No work units at risk within {} day(s)", args.days);
            } else {
                println!("{} work unit(s) at risk:", at_risk.len());
                for entry in &at_risk {
                    let reasons: Vec<String> = entry
                        .reasons
                        .iter()
                        .map(|r| format!("{r:?}"))
                        .collect();
                    println!(
                        "  {}  {}  due {}  [{}]",
                        entry.work_unit.id,
                        entry.work_unit.source_ref,
                        entry.work_unit.planned_end,
                        reasons.join(", ")
                    );
                }
            }
        }
    }

    Ok(())
}
