//! Blueprint-driven dependency wiring.
//!
//! When a work unit is created, the blueprint matching its structure hint
//! (exact match first, then the default) wires it into the project's
//! existing graph: steps whose successor kind matches gain predecessors,
//! steps whose predecessor kind matches gain successors. Wiring is
//! best-effort per edge: duplicates and would-be cycles are skipped and
//! counted, never propagated.

use crate::domain::{WorkUnit, WorkUnitFilter};
use crate::error::{Error, Result};
use crate::storage::OpsStore;
use tracing::debug;

/// Cap on wired units per step direction, keeping a late-created unit from
/// being linked to an entire backlog at once.
const MAX_WIRED: usize = 10;

/// Counts from applying a blueprint to one work unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlueprintOutcome {
    /// Edges created.
    pub created: usize,

    /// Edges skipped (already present, or rejected to keep the graph
    /// acyclic).
    pub skipped: usize,
}

/// Wire a freshly created unit into its project's graph per the matching
/// blueprint.
///
/// Returns `None` when no blueprint applies to the unit's structure hint.
///
/// # Errors
///
/// Storage failures propagate; per-edge duplicate and cycle rejections do
/// not.
pub async fn apply_blueprint(
    store: &mut dyn OpsStore,
    unit: &WorkUnit,
) -> Result<Option<BlueprintOutcome>> {
    let Some(blueprint) = store.blueprint_for(unit.structure_hint.as_deref()).await? else {
        debug!(unit = %unit.id, "no blueprint for structure hint");
        return Ok(None);
    };

    debug!(unit = %unit.id, blueprint = %blueprint.name, "applying blueprint");
    let mut outcome = BlueprintOutcome::default();

    for step in &blueprint.steps {
        // The new unit as successor: wire existing units of the
        // predecessor kind upstream of it.
        if step.to_kind == unit.kind {
            let predecessors = matching_units(store, unit, step.from_kind).await?;
            for predecessor in predecessors {
                wire(
                    store,
                    &mut outcome,
                    &predecessor.id,
                    &unit.id,
                    step.dependency_kind,
                    step.lag_days,
                )
                .await?;
            }
        }

        // The new unit as predecessor: wire existing units of the
        // successor kind downstream of it.
        if step.from_kind == unit.kind {
            let successors = matching_units(store, unit, step.to_kind).await?;
            for successor in successors {
                wire(
                    store,
                    &mut outcome,
                    &unit.id,
                    &successor.id,
                    step.dependency_kind,
                    step.lag_days,
                )
                .await?;
            }
        }
    }

    debug!(
        unit = %unit.id,
        created = outcome.created,
        skipped = outcome.skipped,
        "blueprint applied"
    );
    Ok(Some(outcome))
}

async fn matching_units(
    store: &dyn OpsStore,
    unit: &WorkUnit,
    kind: crate::domain::WorkUnitKind,
) -> Result<Vec<WorkUnit>> {
    let filter = WorkUnitFilter {
        project_id: Some(unit.project_id.clone()),
        kind: Some(kind),
        limit: Some(MAX_WIRED + 1),
        ..WorkUnitFilter::default()
    };
    let mut units = store.list_work_units(&filter).await?;
    units.retain(|u| u.id != unit.id);
    units.truncate(MAX_WIRED);
    Ok(units)
}

async fn wire(
    store: &mut dyn OpsStore,
    outcome: &mut BlueprintOutcome,
    from: &crate::domain::WorkUnitId,
    to: &crate::domain::WorkUnitId,
    kind: crate::domain::DependencyKind,
    lag_days: i64,
) -> Result<()> {
    match store.add_dependency(from, to, kind, lag_days).await {
        Ok(_) => outcome.created += 1,
        Err(Error::DuplicateDependency { .. } | Error::CycleDetected { .. }) => {
            outcome.skipped += 1;
        }
        Err(e) => return Err(e),
    }
    Ok(())
}
