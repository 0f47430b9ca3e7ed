//! Domain types for the operations control core.
//!
//! A [`WorkUnit`] abstracts one piece of trackable work from any business
//! module; [`Dependency`] edges form a per-project DAG over them;
//! [`ResourceCapacity`] records available supply per resource and window;
//! [`RiskEvent`]s are the deduplicated output of the early warning engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a string-backed identifier newtype.
macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_type!(
    /// Unique identifier for a work unit.
    WorkUnitId
);
id_type!(
    /// Unique identifier for a dependency edge.
    DependencyId
);
id_type!(
    /// Identifier of the project a work unit belongs to. Project records
    /// themselves are owned by external modules.
    ProjectId
);
id_type!(
    /// Identifier of a resource (person, team, vendor, equipment).
    ResourceId
);
id_type!(
    /// Unique identifier for a capacity window.
    CapacityId
);
id_type!(
    /// Unique identifier for a risk event.
    RiskEventId
);
id_type!(
    /// Unique identifier for a dependency blueprint.
    BlueprintId
);

/// Weak back-reference from a work unit to the business record it tracks.
///
/// This is a plain identifier pair, never a foreign-key-enforced relation:
/// the referenced record's lifecycle is owned elsewhere and must be free to
/// disappear while the work unit survives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Kind of the originating record (e.g. "task", "work_order", "rfi").
    pub entity_kind: String,

    /// Identifier of the originating record within its own module.
    pub entity_id: String,
}

impl SourceRef {
    /// Create a new source reference.
    pub fn new(entity_kind: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_kind: entity_kind.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_kind, self.entity_id)
    }
}

/// Kind of work a unit represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkUnitKind {
    /// Engineering / design work.
    Design,

    /// Purchasing and supply actions.
    Procurement,

    /// Document production and submission.
    Documentation,

    /// Fabrication / production work.
    Production,

    /// Quality control inspections.
    Qc,

    /// Site erection work.
    Erection,

    /// Anything that does not fit the above.
    Other,
}

/// Status of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkUnitStatus {
    /// Work has not begun.
    NotStarted,

    /// Work is underway.
    InProgress,

    /// Work is done.
    Completed,

    /// Work cannot proceed.
    Blocked,

    /// Work is running behind its plan.
    Delayed,
}

impl WorkUnitStatus {
    /// Whether this status marks the unit as running behind or stuck.
    /// Used by the cascade rule to pick predecessors worth projecting.
    pub fn is_troubled(self) -> bool {
        matches!(self, WorkUnitStatus::Blocked | WorkUnitStatus::Delayed)
    }
}

/// A node in the dependency graph: one piece of trackable work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Unique identifier.
    pub id: WorkUnitId,

    /// Project this unit belongs to.
    pub project_id: ProjectId,

    /// Kind of work.
    pub kind: WorkUnitKind,

    /// Current status.
    pub status: WorkUnitStatus,

    /// Planned start date.
    pub planned_start: NaiveDate,

    /// Planned end date.
    pub planned_end: NaiveDate,

    /// Actual start date, once known.
    pub actual_start: Option<NaiveDate>,

    /// Actual end date, once known.
    pub actual_end: Option<NaiveDate>,

    /// Weak back-reference to the originating business record.
    pub source_ref: SourceRef,

    /// Resource responsible for this unit, if any. Drives load aggregation.
    pub owner_resource_id: Option<ResourceId>,

    /// Opaque numeric load weight (e.g. estimated hours), supplied by the
    /// creating module. The core never interprets it beyond summation.
    pub unit_cost: f64,

    /// Structure type of the owning project, as reported by the creating
    /// module. Used only to select a dependency blueprint.
    pub structure_hint: Option<String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,

    /// Soft-close marker. A unit still referenced by dependency edges is
    /// retired instead of hard-deleted; retired units are excluded from
    /// listings and rule evaluation.
    pub retired_at: Option<DateTime<Utc>>,
}

impl WorkUnit {
    /// Planned duration in days. Zero-length plans yield 0.
    pub fn planned_duration_days(&self) -> i64 {
        (self.planned_end - self.planned_start).num_days().max(0)
    }

    /// Whether the unit participates in queries and rule evaluation.
    pub fn is_live(&self) -> bool {
        self.retired_at.is_none()
    }
}

/// Data for creating (or idempotently re-upserting) a work unit.
///
/// Upserts are keyed by [`NewWorkUnit::source_ref`]: a second sync for the
/// same business record updates the existing unit instead of inserting.
#[derive(Debug, Clone)]
pub struct NewWorkUnit {
    /// Project this unit belongs to.
    pub project_id: ProjectId,

    /// Kind of work.
    pub kind: WorkUnitKind,

    /// Back-reference to the originating business record (upsert key).
    pub source_ref: SourceRef,

    /// Planned start date.
    pub planned_start: NaiveDate,

    /// Planned end date.
    pub planned_end: NaiveDate,

    /// Actual start date, if already known at sync time.
    pub actual_start: Option<NaiveDate>,

    /// Actual end date, if already known at sync time.
    pub actual_end: Option<NaiveDate>,

    /// Initial status (defaults to not-started).
    pub status: Option<WorkUnitStatus>,

    /// Responsible resource, if any.
    pub owner_resource_id: Option<ResourceId>,

    /// Opaque load weight.
    pub unit_cost: f64,

    /// Structure type hint for blueprint selection.
    pub structure_hint: Option<String>,
}

/// Data for updating an existing work unit. Only present fields change.
#[derive(Debug, Clone, Default)]
pub struct WorkUnitUpdate {
    /// New status (if updating).
    pub status: Option<WorkUnitStatus>,

    /// New planned start (if updating).
    pub planned_start: Option<NaiveDate>,

    /// New planned end (if updating).
    pub planned_end: Option<NaiveDate>,

    /// New actual start (if updating).
    pub actual_start: Option<NaiveDate>,

    /// New actual end (if updating).
    pub actual_end: Option<NaiveDate>,

    /// New owner (if updating; `Some(None)` clears).
    pub owner_resource_id: Option<Option<ResourceId>>,

    /// New load weight (if updating).
    pub unit_cost: Option<f64>,
}

/// Filter for querying work units.
#[derive(Debug, Clone, Default)]
pub struct WorkUnitFilter {
    /// Filter by project.
    pub project_id: Option<ProjectId>,

    /// Filter by kind.
    pub kind: Option<WorkUnitKind>,

    /// Filter by status.
    pub status: Option<WorkUnitStatus>,

    /// Filter by owning resource.
    pub owner_resource_id: Option<ResourceId>,

    /// Planned start at or after this date.
    pub planned_start_from: Option<NaiveDate>,

    /// Planned start at or before this date.
    pub planned_start_to: Option<NaiveDate>,

    /// Planned end at or after this date.
    pub planned_end_from: Option<NaiveDate>,

    /// Planned end at or before this date.
    pub planned_end_to: Option<NaiveDate>,

    /// Include soft-closed units (default false).
    pub include_retired: bool,

    /// Limit number of results.
    pub limit: Option<usize>,
}

/// Type of dependency relationship between two work units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    /// Successor may start once the predecessor finishes (plus lag).
    FinishToStart,

    /// Successor may start once the predecessor starts (plus lag).
    StartToStart,

    /// Successor may finish once the predecessor finishes (plus lag).
    FinishToFinish,
}

/// A directed, typed edge between two work units.
///
/// The directed graph formed by all edges of a project must remain acyclic
/// at all times; this is enforced when the edge is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Unique identifier.
    pub id: DependencyId,

    /// Predecessor work unit.
    pub from: WorkUnitId,

    /// Successor work unit.
    pub to: WorkUnitId,

    /// Relationship type.
    pub kind: DependencyKind,

    /// Lag in days; negative values express lead time.
    pub lag_days: i64,
}

/// Kind of resource a capacity record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A single person.
    Person,

    /// A team of people.
    Team,

    /// An external vendor.
    Vendor,

    /// A machine or other equipment.
    Equipment,
}

/// Unit in which capacity and load are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityUnit {
    /// Working hours.
    Hours,

    /// Produced units (tons, drawings, ...).
    Units,

    /// Plain item count.
    Count,
}

/// Available supply for a resource in a time window.
///
/// Multiple windows may exist per resource, overlapping or not; each is
/// evaluated independently (avoiding double-counted supply is the caller's
/// responsibility).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCapacity {
    /// Unique identifier.
    pub id: CapacityId,

    /// Resource this window belongs to.
    pub resource_id: ResourceId,

    /// Kind of resource.
    pub resource_kind: ResourceKind,

    /// Measurement unit.
    pub unit: CapacityUnit,

    /// Window start (inclusive).
    pub period_start: NaiveDate,

    /// Window end (inclusive).
    pub period_end: NaiveDate,

    /// Available supply over the window.
    pub capacity_value: f64,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Data for recording a capacity window. Re-recording the same
/// `(resource_id, period_start)` pair overwrites the earlier window.
#[derive(Debug, Clone)]
pub struct NewCapacity {
    /// Resource the window belongs to.
    pub resource_id: ResourceId,

    /// Kind of resource.
    pub resource_kind: ResourceKind,

    /// Measurement unit.
    pub unit: CapacityUnit,

    /// Window start (inclusive).
    pub period_start: NaiveDate,

    /// Window end (inclusive).
    pub period_end: NaiveDate,

    /// Available supply over the window.
    pub capacity_value: f64,
}

/// The rule that detected a risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRule {
    /// A not-started unit has burned too much of its planned duration.
    LateStart,

    /// A troubled predecessor projects unabsorbed delay onto a successor.
    DependencyCascade,

    /// A resource's prorated load exceeds its recorded capacity bands.
    CapacityOverload,

    /// A unit on the project's longest planned chain has slipped.
    CriticalPathDelay,
}

impl RiskRule {
    /// All rules, in sweep evaluation order.
    pub const ALL: [RiskRule; 4] = [
        RiskRule::LateStart,
        RiskRule::DependencyCascade,
        RiskRule::CapacityOverload,
        RiskRule::CriticalPathDelay,
    ];

    /// Stable name used in fingerprints and log output.
    pub fn as_str(self) -> &'static str {
        match self {
            RiskRule::LateStart => "late_start",
            RiskRule::DependencyCascade => "dependency_cascade",
            RiskRule::CapacityOverload => "capacity_overload",
            RiskRule::CriticalPathDelay => "critical_path_delay",
        }
    }
}

impl fmt::Display for RiskRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a risk event. Ordered: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Minor schedule noise.
    Low,

    /// Worth watching.
    Medium,

    /// Needs intervention.
    High,

    /// Threatens the project schedule.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// What a risk event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RiskSubject {
    /// The risk concerns a work unit.
    WorkUnit(WorkUnitId),

    /// The risk concerns a resource.
    Resource(ResourceId),
}

/// A deduplicated risk alert emitted by the early warning engine.
///
/// At most one unresolved event exists per fingerprint at any time:
/// re-detection updates [`RiskEvent::last_seen_at`], never inserts a
/// duplicate; when the condition stops holding the event is resolved, never
/// silently dropped. Resolved is terminal: a later recurrence creates a new
/// event with a fresh [`RiskEvent::detected_at`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvent {
    /// Unique identifier.
    pub id: RiskEventId,

    /// Project the risk belongs to.
    pub project_id: ProjectId,

    /// Subject of the risk.
    pub subject: RiskSubject,

    /// Detecting rule.
    pub rule: RiskRule,

    /// Severity at last detection.
    pub severity: Severity,

    /// Deterministic key identifying "the same incident" across passes.
    pub fingerprint: String,

    /// Short human-readable summary.
    pub title: String,

    /// Longer description with the detected figures.
    pub description: String,

    /// First detection time of this incident.
    pub detected_at: DateTime<Utc>,

    /// Last sweep that still observed the condition.
    pub last_seen_at: DateTime<Utc>,

    /// Set when the condition stopped holding; terminal.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl RiskEvent {
    /// Whether the event is still open.
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// A candidate risk produced by a pure rule evaluation, before the
/// upsert/resolve phase reconciles it against open events.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskCandidate {
    /// Project the risk belongs to.
    pub project_id: ProjectId,

    /// Subject of the risk.
    pub subject: RiskSubject,

    /// Detecting rule.
    pub rule: RiskRule,

    /// Severity as of this evaluation.
    pub severity: Severity,

    /// Deterministic incident key.
    pub fingerprint: String,

    /// Short human-readable summary.
    pub title: String,

    /// Longer description with the detected figures.
    pub description: String,
}

/// Filter for querying active risk events.
#[derive(Debug, Clone, Default)]
pub struct RiskEventFilter {
    /// Filter by severity.
    pub severity: Option<Severity>,

    /// Filter by rule.
    pub rule: Option<RiskRule>,

    /// Filter by project.
    pub project_id: Option<ProjectId>,
}

/// One step of a dependency blueprint: wire units of `from_kind` as
/// predecessors of units of `to_kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintStep {
    /// Predecessor kind.
    pub from_kind: WorkUnitKind,

    /// Successor kind.
    pub to_kind: WorkUnitKind,

    /// Edge type to create.
    pub dependency_kind: DependencyKind,

    /// Lag in days for the created edges.
    pub lag_days: i64,
}

/// A standard dependency chain applied automatically when a work unit is
/// created. Read-only at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyBlueprint {
    /// Unique identifier.
    pub id: BlueprintId,

    /// Human-readable name.
    pub name: String,

    /// Structure type this blueprint applies to; `None` marks the default
    /// blueprint used when no exact match exists.
    pub structure_type: Option<String>,

    /// Inactive blueprints are never matched.
    pub active: bool,

    /// Ordered wiring steps.
    pub steps: Vec<BlueprintStep>,
}
