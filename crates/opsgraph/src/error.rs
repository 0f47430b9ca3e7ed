//! Error types for opsgraph operations.

use crate::domain::WorkUnitId;
use std::io;
use thiserror::Error;

/// The error type for opsgraph operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transient storage error. A sweep rule hitting this abandons its
    /// remaining work for the pass; the next sweep retries naturally.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Work unit not found.
    #[error("Work unit not found: {0}")]
    WorkUnitNotFound(WorkUnitId),

    /// Dependency edge not found.
    #[error("Dependency not found: {from} -> {to}")]
    DependencyNotFound {
        /// Predecessor work unit.
        from: WorkUnitId,
        /// Successor work unit.
        to: WorkUnitId,
    },

    /// A dependency edge between these work units already exists.
    #[error("Dependency already exists: {from} -> {to}")]
    DuplicateDependency {
        /// Predecessor work unit.
        from: WorkUnitId,
        /// Successor work unit.
        to: WorkUnitId,
    },

    /// Dependency endpoints belong to different projects. Impact analysis
    /// and dependency listings are scoped per project, so such an edge
    /// could never be observed; it is rejected at write time.
    #[error("Cross-project dependency rejected: {from} -> {to}")]
    CrossProjectDependency {
        /// Predecessor work unit.
        from: WorkUnitId,
        /// Successor work unit.
        to: WorkUnitId,
    },

    /// Adding this edge would close a cycle. The write is rejected and the
    /// graph is unchanged; the invariant is enforced at edge-creation time,
    /// never repaired after the fact.
    #[error("Cycle detected: adding {from} -> {to} would create a circular dependency")]
    CycleDetected {
        /// Predecessor work unit.
        from: WorkUnitId,
        /// Successor work unit.
        to: WorkUnitId,
    },
}

/// A specialized Result type for opsgraph operations.
pub type Result<T> = std::result::Result<T, Error>;
