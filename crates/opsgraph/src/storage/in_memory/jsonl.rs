//! JSONL snapshot persistence for the in-memory store.
//!
//! The snapshot file holds one tagged record per line: work units first,
//! then dependencies, capacities, risk events and blueprints. Loading is
//! resilient: malformed lines, orphaned edges and cycle-closing edges are
//! skipped with a warning instead of failing the load.

use super::inner::StoreInner;
use crate::domain::{
    Dependency, DependencyBlueprint, ResourceCapacity, RiskEvent, WorkUnit, WorkUnitId,
};
use crate::error::{Error, Result};
use crate::storage::OpsStore;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use serde::{Deserialize, Serialize};

/// One line of the snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record {
    /// A work unit row.
    WorkUnit(WorkUnit),

    /// A dependency edge row.
    Dependency(Dependency),

    /// A capacity window row.
    Capacity(ResourceCapacity),

    /// A risk event row.
    RiskEvent(RiskEvent),

    /// A blueprint row.
    Blueprint(DependencyBlueprint),
}

/// Non-fatal problems encountered while loading a snapshot.
///
/// The load continues past each of these; the affected line or edge is
/// skipped. Callers should surface the warnings, since they indicate a
/// hand-edited or partially written file.
#[derive(Debug, Clone)]
pub enum LoadWarning {
    /// A line that could not be parsed as a snapshot record.
    MalformedLine {
        /// 1-based line number in the file.
        line_number: usize,
        /// Parse error text.
        error: String,
    },

    /// A dependency edge referencing a unit absent from the file.
    OrphanedDependency {
        /// Predecessor id as recorded.
        from: WorkUnitId,
        /// Successor id as recorded.
        to: WorkUnitId,
    },

    /// A dependency edge that would close a cycle; dropped to keep the
    /// acyclicity invariant.
    CycleDropped {
        /// Predecessor id as recorded.
        from: WorkUnitId,
        /// Successor id as recorded.
        to: WorkUnitId,
    },
}

/// Load a store from a JSONL snapshot file.
///
/// Returns the store plus all non-fatal warnings. Records are applied in
/// two passes so edge validation can see every unit regardless of line
/// order in the file.
///
/// # Errors
///
/// Returns an error only when the file itself cannot be read; data-level
/// problems become warnings.
pub async fn load_from_jsonl(path: &Path) -> Result<(Box<dyn OpsStore>, Vec<LoadWarning>)> {
    let raw = tokio::fs::read_to_string(path).await.map_err(Error::Io)?;

    let mut warnings = Vec::new();
    let mut records = Vec::new();

    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(line) {
            Ok(record) => records.push(record),
            Err(e) => warnings.push(LoadWarning::MalformedLine {
                line_number: index + 1,
                error: e.to_string(),
            }),
        }
    }

    let mut inner = StoreInner::new();

    // First pass: everything except edges
    let mut pending_edges = Vec::new();
    for record in records {
        match record {
            Record::WorkUnit(unit) => inner.insert_unit(unit),
            Record::Dependency(dep) => pending_edges.push(dep),
            Record::Capacity(cap) => {
                inner
                    .capacities
                    .insert((cap.resource_id.clone(), cap.period_start), cap);
            }
            Record::RiskEvent(event) => {
                if event.is_open() {
                    inner
                        .open_by_fingerprint
                        .insert(event.fingerprint.clone(), event.id.clone());
                }
                inner.risks.insert(event.id.clone(), event);
            }
            Record::Blueprint(blueprint) => {
                inner.blueprints.insert(blueprint.id.clone(), blueprint);
            }
        }
    }

    // Second pass: edges, validated against the loaded units
    for dep in pending_edges {
        if !inner.units.contains_key(&dep.from) || !inner.units.contains_key(&dep.to) {
            warnings.push(LoadWarning::OrphanedDependency {
                from: dep.from,
                to: dep.to,
            });
            continue;
        }
        match inner.restore_edge(dep) {
            Ok(()) => {}
            Err(Error::CycleDetected { from, to }) => {
                warnings.push(LoadWarning::CycleDropped { from, to });
            }
            Err(Error::DuplicateDependency { from, to }) => {
                // Treat a doubled line like an orphan: keep the first edge
                warnings.push(LoadWarning::OrphanedDependency { from, to });
            }
            Err(e) => return Err(e),
        }
    }

    inner.register_loaded_ids();

    Ok((Box::new(Arc::new(Mutex::new(inner))), warnings))
}

/// Save a store to a JSONL snapshot file with an atomic write.
///
/// Writes to a temporary sibling file first and renames it into place, so
/// an interrupted save leaves the previous snapshot intact.
pub async fn save_to_jsonl(store: &dyn OpsStore, path: &Path) -> Result<()> {
    let snapshot = store.snapshot().await?;
    let temp_path = path.with_extension("tmp");

    let file = File::create(&temp_path).await.map_err(Error::Io)?;
    let mut writer = BufWriter::new(file);

    let records = snapshot
        .work_units
        .into_iter()
        .map(Record::WorkUnit)
        .chain(snapshot.dependencies.into_iter().map(Record::Dependency))
        .chain(snapshot.capacities.into_iter().map(Record::Capacity))
        .chain(snapshot.risk_events.into_iter().map(Record::RiskEvent))
        .chain(snapshot.blueprints.into_iter().map(Record::Blueprint));

    for record in records {
        let json = serde_json::to_string(&record)?;
        writer.write_all(json.as_bytes()).await.map_err(Error::Io)?;
        writer.write_all(b"\n").await.map_err(Error::Io)?;
    }

    writer.flush().await.map_err(Error::Io)?;

    tokio::fs::rename(&temp_path, path).await.map_err(Error::Io)?;

    Ok(())
}
