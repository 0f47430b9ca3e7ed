//! Application facade.
//!
//! [`OpsControl`] owns the store and the early warning engine and exposes
//! the system's logical operations to callers (the CLI binary, the sweep
//! scheduler, embedding services). Persistence is explicit: mutating
//! operations change in-memory state, and [`OpsControl::save`] writes the
//! snapshot when a data path is configured.

use crate::blueprint::apply_blueprint;
use crate::config::EngineConfig;
use crate::domain::{
    Dependency, DependencyKind, NewCapacity, NewWorkUnit, ResourceCapacity, RiskEvent,
    RiskEventFilter, SourceRef, WorkUnit, WorkUnitFilter, WorkUnitId, WorkUnitStatus,
    WorkUnitUpdate,
};
use crate::engine::{EarlyWarningEngine, SweepOutcome};
use crate::error::{Error, Result};
use crate::graph::{DelayImpact, GraphSnapshot};
use crate::storage::{OpsStore, StorageBackend, create_store, in_memory};
use crate::sync;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Why a work unit appears in the at-risk listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AtRiskReason {
    /// Not started although its planned start has passed.
    LateStart,

    /// Planned end falls within the lookahead window.
    ApproachingDeadline,

    /// Currently blocked.
    Blocked,
}

/// A work unit flagged by the at-risk query, with every applicable reason.
#[derive(Debug, Clone, Serialize)]
pub struct AtRiskWorkUnit {
    /// The flagged unit.
    pub work_unit: WorkUnit,

    /// All reasons that apply.
    pub reasons: Vec<AtRiskReason>,
}

/// The operations control facade.
pub struct OpsControl {
    store: Box<dyn OpsStore>,
    engine: EarlyWarningEngine,
    data_path: Option<PathBuf>,
}

impl std::fmt::Debug for OpsControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsControl")
            .field("data_path", &self.data_path)
            .field("store", &"<dyn OpsStore>")
            .finish()
    }
}

impl OpsControl {
    /// Wrap an existing store.
    pub fn new(store: Box<dyn OpsStore>, config: EngineConfig) -> Self {
        Self {
            store,
            engine: EarlyWarningEngine::new(config),
            data_path: None,
        }
    }

    /// Open a store for the given backend.
    ///
    /// For the JSONL backend the data path is remembered so [`Self::save`]
    /// can write the snapshot back.
    pub async fn open(backend: StorageBackend, config: EngineConfig) -> Result<Self> {
        let data_path = match &backend {
            StorageBackend::Jsonl(path) => Some(path.clone()),
            StorageBackend::InMemory => None,
        };
        let store = create_store(backend).await?;
        Ok(Self {
            store,
            engine: EarlyWarningEngine::new(config),
            data_path,
        })
    }

    /// The engine thresholds in effect.
    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    /// Immutable access to the underlying store.
    pub fn store(&self) -> &dyn OpsStore {
        self.store.as_ref()
    }

    /// Mutable access to the underlying store.
    pub fn store_mut(&mut self) -> &mut dyn OpsStore {
        self.store.as_mut()
    }

    /// Create or idempotently update the work unit tracking a source
    /// record, then wire it per the matching blueprint.
    ///
    /// Unlike [`Self::sync_work_unit`], storage failures propagate.
    pub async fn create_or_update_work_unit(&mut self, new: NewWorkUnit) -> Result<WorkUnit> {
        let unit = self.store.upsert_work_unit(new).await?;
        apply_blueprint(self.store.as_mut(), &unit).await?;
        Ok(unit)
    }

    /// Best-effort variant of [`Self::create_or_update_work_unit`]:
    /// failures are logged and swallowed.
    pub async fn sync_work_unit(&mut self, new: NewWorkUnit) -> Option<WorkUnit> {
        sync::sync_work_unit(self.store.as_mut(), new).await
    }

    /// Best-effort propagation of a source record's status change.
    pub async fn sync_status_update(
        &mut self,
        source_ref: &SourceRef,
        source_status: &str,
    ) -> Option<WorkUnit> {
        sync::sync_status_update(self.store.as_mut(), source_ref, source_status).await
    }

    /// Update a work unit directly.
    pub async fn update_work_unit(
        &mut self,
        id: &WorkUnitId,
        update: WorkUnitUpdate,
    ) -> Result<WorkUnit> {
        self.store.update_work_unit(id, update).await
    }

    /// Add a typed dependency edge between two work units.
    pub async fn add_dependency(
        &mut self,
        from: &WorkUnitId,
        to: &WorkUnitId,
        kind: DependencyKind,
        lag_days: i64,
    ) -> Result<Dependency> {
        self.store.add_dependency(from, to, kind, lag_days).await
    }

    /// Record a resource capacity window.
    pub async fn record_capacity(&mut self, new: NewCapacity) -> Result<ResourceCapacity> {
        self.store.record_capacity(new).await
    }

    /// Project a delay on one unit through its project's graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkUnitNotFound`] when the root unit is absent.
    pub async fn get_delay_impact(
        &self,
        id: &WorkUnitId,
        delay_days: i64,
    ) -> Result<Vec<DelayImpact>> {
        let unit = self
            .store
            .get_work_unit(id)
            .await?
            .ok_or_else(|| Error::WorkUnitNotFound(id.clone()))?;

        let filter = WorkUnitFilter {
            project_id: Some(unit.project_id.clone()),
            ..WorkUnitFilter::default()
        };
        let units = self.store.list_work_units(&filter).await?;
        let deps = self.store.list_dependencies(Some(&unit.project_id)).await?;

        let snapshot = GraphSnapshot::build(units, deps);
        Ok(snapshot.delay_impact(id, delay_days))
    }

    /// Units needing attention right now: not started past their planned
    /// start, due within `days_threshold` days, or blocked. Completed
    /// units never appear; a unit carries every reason that applies.
    pub async fn get_at_risk_work_units(
        &self,
        days_threshold: i64,
    ) -> Result<Vec<AtRiskWorkUnit>> {
        let today = Utc::now().date_naive();
        let horizon = today + Duration::days(days_threshold.max(0));

        let units = self.store.list_work_units(&WorkUnitFilter::default()).await?;

        let mut at_risk = Vec::new();
        for unit in units {
            if unit.status == WorkUnitStatus::Completed {
                continue;
            }

            let mut reasons = Vec::new();
            if unit.status == WorkUnitStatus::NotStarted && today > unit.planned_start {
                reasons.push(AtRiskReason::LateStart);
            }
            if unit.planned_end >= today && unit.planned_end <= horizon {
                reasons.push(AtRiskReason::ApproachingDeadline);
            }
            if unit.status == WorkUnitStatus::Blocked {
                reasons.push(AtRiskReason::Blocked);
            }

            if !reasons.is_empty() {
                at_risk.push(AtRiskWorkUnit {
                    work_unit: unit,
                    reasons,
                });
            }
        }

        Ok(at_risk)
    }

    /// Run one early warning sweep. Returns a skipped outcome when a
    /// sweep is already in flight.
    pub async fn run_sweep(&mut self) -> Result<SweepOutcome> {
        self.engine.run_sweep(self.store.as_mut()).await
    }

    /// Open risk events matching the filter, most severe first.
    pub async fn list_active_risk_events(
        &self,
        filter: &RiskEventFilter,
    ) -> Result<Vec<RiskEvent>> {
        self.store.list_risk_events(filter).await
    }

    /// Persist the snapshot, if a data path is configured.
    pub async fn save(&self) -> Result<()> {
        if let Some(path) = &self.data_path {
            in_memory::save_to_jsonl(self.store.as_ref(), path).await?;
        }
        Ok(())
    }
}
