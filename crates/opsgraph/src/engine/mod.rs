//! The early warning engine.
//!
//! A sweep evaluates every rule against a fresh view of the store and
//! reconciles the detections against open risk events. Sweeps are
//! serialized by an atomic running flag: a trigger arriving while one is in
//! flight is skipped, never queued, so overlapping timers cannot stack
//! passes. Within a pass each rule is isolated: a storage failure in one
//! rule is logged and abandoned while the remaining rules proceed.

pub mod rules;

use crate::config::EngineConfig;
use crate::domain::{RiskCandidate, RiskRule, WorkUnitFilter};
use crate::error::Result;
use crate::graph::GraphSnapshot;
use crate::storage::OpsStore;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Result of one sweep trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    /// New risk events inserted.
    pub created: usize,

    /// Existing open events re-detected and touched.
    pub updated: usize,

    /// Open events whose condition stopped holding.
    pub resolved: usize,

    /// True when the trigger found a sweep already in flight and did
    /// nothing.
    pub skipped: bool,
}

impl SweepOutcome {
    /// Outcome for a trigger that found a sweep already running.
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Releases the running flag on every exit path, panics included.
struct SweepGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SweepGuard<'a> {
    /// Try to acquire the flag. `None` means a sweep is already running.
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Rule evaluation and sweep orchestration.
///
/// The engine holds the thresholds and the running flag; the store is
/// borrowed per sweep so the same engine can serve whatever owns the
/// storage.
pub struct EarlyWarningEngine {
    config: EngineConfig,
    running: Arc<AtomicBool>,
}

impl EarlyWarningEngine {
    /// Create an engine with the given thresholds.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The thresholds in effect.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a sweep is currently in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one sweep over the store.
    ///
    /// Returns [`SweepOutcome::skipped`] without touching the store when
    /// another sweep is in flight. Otherwise every rule is evaluated
    /// against state read at the start of its own evaluation, and each
    /// rule's detections are committed as one logical unit.
    pub async fn run_sweep(&self, store: &mut dyn OpsStore) -> Result<SweepOutcome> {
        let Some(_guard) = SweepGuard::try_acquire(&self.running) else {
            debug!("sweep already in flight, skipping trigger");
            return Ok(SweepOutcome::skipped());
        };

        let now = Utc::now();
        let today = now.date_naive();
        let mut outcome = SweepOutcome::default();

        for rule in RiskRule::ALL {
            let candidates = match self.evaluate_rule(store, rule, today).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(rule = %rule, error = %e, "rule evaluation failed, abandoning for this pass");
                    continue;
                }
            };

            let detected = candidates.len();
            match store.commit_rule_outcome(rule, candidates, now).await {
                Ok(commit) => {
                    debug!(
                        rule = %rule,
                        detected,
                        created = commit.created,
                        updated = commit.updated,
                        resolved = commit.resolved,
                        "rule committed"
                    );
                    outcome.created += commit.created;
                    outcome.updated += commit.updated;
                    outcome.resolved += commit.resolved;
                }
                Err(e) => {
                    warn!(rule = %rule, error = %e, "rule commit failed, abandoning for this pass");
                }
            }
        }

        info!(
            created = outcome.created,
            updated = outcome.updated,
            resolved = outcome.resolved,
            "sweep complete"
        );
        Ok(outcome)
    }

    /// Gather the state one rule needs and evaluate it. Pure evaluation
    /// over freshly listed state; failures here are storage failures.
    async fn evaluate_rule(
        &self,
        store: &dyn OpsStore,
        rule: RiskRule,
        today: NaiveDate,
    ) -> Result<Vec<RiskCandidate>> {
        // Capacity is assessed globally; the graph rules run per project.
        if rule == RiskRule::CapacityOverload {
            let units = store.list_work_units(&WorkUnitFilter::default()).await?;
            let capacities = store.list_capacities(None).await?;
            return Ok(rules::capacity_overload(
                &units,
                &capacities,
                &self.config.capacity_bands(),
            ));
        }

        let mut candidates = Vec::new();
        for project in store.project_ids().await? {
            let filter = WorkUnitFilter {
                project_id: Some(project.clone()),
                ..WorkUnitFilter::default()
            };
            let units = store.list_work_units(&filter).await?;
            let deps = store.list_dependencies(Some(&project)).await?;
            let snapshot = GraphSnapshot::build(units, deps);

            candidates.extend(match rule {
                RiskRule::LateStart => rules::late_start(&snapshot, &self.config, today),
                RiskRule::DependencyCascade => rules::dependency_cascade(&snapshot, today),
                RiskRule::CriticalPathDelay => {
                    rules::critical_path_delay(&snapshot, &self.config, today)
                }
                RiskRule::CapacityOverload => Vec::new(),
            });
        }
        Ok(candidates)
    }
}
