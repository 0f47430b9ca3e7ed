//! Storage abstraction layer for opsgraph.
//!
//! The [`OpsStore`] trait is the graph store behind every higher-level
//! service: work units, dependency edges, capacity windows, risk events and
//! blueprints all live behind it. The trait is async and object-safe so the
//! in-memory backend (optionally persisted as a JSONL snapshot) and any
//! future database backend are interchangeable via `Box<dyn OpsStore>`.
//!
//! # Consistency rules
//!
//! - The dependency graph is acyclic at all times: `add_dependency` rejects
//!   self-edges, duplicates and cycles atomically, leaving the graph
//!   unchanged on rejection.
//! - Work-unit upserts are idempotent, keyed by source reference.
//! - `commit_rule_outcome` applies one rule's entire detection result as a
//!   single logical unit so a half-committed sweep pass is never observable.

use crate::domain::{
    Dependency, DependencyBlueprint, DependencyKind, NewCapacity, NewWorkUnit, ProjectId,
    ResourceCapacity, ResourceId, RiskCandidate, RiskEvent, RiskEventFilter, RiskRule, SourceRef,
    WorkUnit, WorkUnitFilter, WorkUnitId, WorkUnitUpdate,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod in_memory;

/// Counts from committing one rule's detection result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleCommit {
    /// Fingerprints seen for the first time: new events inserted.
    pub created: usize,

    /// Recurring fingerprints: existing events touched.
    pub updated: usize,

    /// Open events whose fingerprint was not re-detected: resolved.
    pub resolved: usize,
}

/// Full contents of a store, as exported for snapshot persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// All work units, retired ones included.
    pub work_units: Vec<WorkUnit>,

    /// All dependency edges.
    pub dependencies: Vec<Dependency>,

    /// All capacity windows.
    pub capacities: Vec<ResourceCapacity>,

    /// All risk events, resolved ones included.
    pub risk_events: Vec<RiskEvent>,

    /// All blueprints.
    pub blueprints: Vec<DependencyBlueprint>,
}

/// Core storage trait for the operations control graph.
///
/// Implementations must be `Send + Sync`; the in-memory backend wraps its
/// state in `Arc<tokio::sync::Mutex<_>>` so every trait method is one lock
/// acquisition.
#[async_trait]
pub trait OpsStore: Send + Sync {
    // ========== Work units ==========

    /// Create a work unit, or update the existing one tracking the same
    /// source record.
    ///
    /// Keyed by [`NewWorkUnit::source_ref`]: a repeated upsert refreshes
    /// dates, status, owner, cost and structure hint while keeping the id
    /// and creation timestamp. Upserting a retired unit revives it.
    async fn upsert_work_unit(&mut self, new: NewWorkUnit) -> Result<WorkUnit>;

    /// Get a work unit by id. Returns `None` if absent or retired.
    async fn get_work_unit(&self, id: &WorkUnitId) -> Result<Option<WorkUnit>>;

    /// Find the live work unit tracking the given source record. Retired
    /// units are invisible here; only an upsert revives one.
    async fn find_by_source_ref(&self, source_ref: &SourceRef) -> Result<Option<WorkUnit>>;

    /// Update an existing work unit. Only fields present in `update`
    /// change.
    ///
    /// The first transition to in-progress stamps `actual_start`, the
    /// transition to completed stamps `actual_end` (explicit values in the
    /// update win).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::WorkUnitNotFound`] if absent.
    async fn update_work_unit(&mut self, id: &WorkUnitId, update: WorkUnitUpdate)
        -> Result<WorkUnit>;

    /// List live work units matching the filter.
    async fn list_work_units(&self, filter: &WorkUnitFilter) -> Result<Vec<WorkUnit>>;

    /// Remove a work unit.
    ///
    /// Hard-deletes only when no dependency edge references the unit;
    /// otherwise soft-closes it by stamping `retired_at` so edge history
    /// stays intact.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::WorkUnitNotFound`] if absent.
    async fn remove_work_unit(&mut self, id: &WorkUnitId) -> Result<()>;

    // ========== Dependencies ==========

    /// Add a typed edge `from -> to`.
    ///
    /// Validation is all-or-nothing: on any rejection the graph is exactly
    /// as it was before the call.
    ///
    /// # Errors
    ///
    /// - [`crate::error::Error::WorkUnitNotFound`] if either endpoint is
    ///   absent or retired
    /// - [`crate::error::Error::CrossProjectDependency`] if the endpoints
    ///   belong to different projects
    /// - [`crate::error::Error::DuplicateDependency`] if an edge between
    ///   the pair already exists
    /// - [`crate::error::Error::CycleDetected`] for self-edges and edges
    ///   that would close a cycle
    async fn add_dependency(
        &mut self,
        from: &WorkUnitId,
        to: &WorkUnitId,
        kind: DependencyKind,
        lag_days: i64,
    ) -> Result<Dependency>;

    /// Remove the edge between two work units.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::DependencyNotFound`] if absent.
    async fn remove_dependency(&mut self, from: &WorkUnitId, to: &WorkUnitId) -> Result<()>;

    /// List edges, optionally restricted to one project's graph.
    async fn list_dependencies(&self, project_id: Option<&ProjectId>) -> Result<Vec<Dependency>>;

    /// Edges around one unit: `(incoming, outgoing)`, predecessors first.
    async fn dependencies_of(
        &self,
        id: &WorkUnitId,
    ) -> Result<(Vec<Dependency>, Vec<Dependency>)>;

    // ========== Capacity ==========

    /// Record a capacity window. Re-recording the same
    /// `(resource, period_start)` pair overwrites the earlier window.
    async fn record_capacity(&mut self, new: NewCapacity) -> Result<ResourceCapacity>;

    /// List capacity windows, optionally for one resource.
    async fn list_capacities(&self, resource_id: Option<&ResourceId>)
        -> Result<Vec<ResourceCapacity>>;

    // ========== Risk events ==========

    /// Insert a fresh risk event from a candidate.
    async fn insert_risk_event(
        &mut self,
        candidate: RiskCandidate,
        now: DateTime<Utc>,
    ) -> Result<RiskEvent>;

    /// Mark the open event with this fingerprint as seen now. Returns
    /// `None` when no open event carries the fingerprint.
    async fn touch_risk_event(
        &mut self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RiskEvent>>;

    /// Resolve the open event with this fingerprint. Resolution is
    /// terminal. Returns `None` when no open event carries the
    /// fingerprint.
    async fn resolve_risk_event(
        &mut self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RiskEvent>>;

    /// All open events, optionally for one rule.
    async fn open_risk_events(&self, rule: Option<RiskRule>) -> Result<Vec<RiskEvent>>;

    /// Open events matching the filter.
    async fn list_risk_events(&self, filter: &RiskEventFilter) -> Result<Vec<RiskEvent>>;

    /// Reconcile one rule's detection result against its open events as a
    /// single logical unit: unseen fingerprints insert, recurring ones
    /// touch (last-seen, severity and description refresh), open events
    /// not re-detected resolve.
    async fn commit_rule_outcome(
        &mut self,
        rule: RiskRule,
        candidates: Vec<RiskCandidate>,
        now: DateTime<Utc>,
    ) -> Result<RuleCommit>;

    // ========== Blueprints ==========

    /// Store a blueprint, replacing any existing one with the same id.
    async fn put_blueprint(&mut self, blueprint: DependencyBlueprint) -> Result<()>;

    /// The active blueprint for a structure type: exact match first, then
    /// the default (one with no structure type).
    async fn blueprint_for(&self, structure_type: Option<&str>)
        -> Result<Option<DependencyBlueprint>>;

    // ========== Projects ==========

    /// Distinct project ids across live work units, sorted.
    async fn project_ids(&self) -> Result<Vec<ProjectId>>;

    // ========== Snapshot ==========

    /// Export the full store contents for snapshot persistence.
    async fn snapshot(&self) -> Result<Snapshot>;
}

/// Storage backend configuration.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// In-memory storage (ephemeral).
    InMemory,

    /// In-memory storage loaded from and saved to a JSONL snapshot file.
    Jsonl(PathBuf),
}

/// Create a store for the given backend.
///
/// For the JSONL backend, a missing file yields an empty store (first run);
/// load warnings are logged and the store is still usable.
///
/// # Errors
///
/// Returns an error when the snapshot file exists but cannot be read.
pub async fn create_store(backend: StorageBackend) -> Result<Box<dyn OpsStore>> {
    match backend {
        StorageBackend::InMemory => Ok(in_memory::new_in_memory_store()),
        StorageBackend::Jsonl(path) => {
            if path.exists() {
                let (store, warnings) = in_memory::load_from_jsonl(&path).await?;
                for warning in &warnings {
                    tracing::warn!(warning = ?warning, "snapshot load warning");
                }
                Ok(store)
            } else {
                Ok(in_memory::new_in_memory_store())
            }
        }
    }
}
