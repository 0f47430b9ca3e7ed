//! Best-effort ingestion from source business modules.
//!
//! Tracking is an observer, never a gatekeeper: when a task, work order or
//! other business record is created or changes status, the owning module
//! calls into this layer, and any failure here is logged and swallowed so
//! the business operation itself never fails because of the tracking
//! layer. Callers that need hard failures use the store directly.

use crate::blueprint::apply_blueprint;
use crate::domain::{NewWorkUnit, SourceRef, WorkUnit, WorkUnitStatus, WorkUnitUpdate};
use crate::storage::OpsStore;
use tracing::{debug, warn};

/// Map a source module's free-form status text onto a work unit status.
///
/// Keyword-based: source modules disagree on exact wording, but the
/// vocabulary is stable. Anything unrecognized (pending, draft, new, ...)
/// is treated as not started.
pub fn map_source_status(source_status: &str) -> WorkUnitStatus {
    let status = source_status.to_lowercase();

    if status.contains("completed") || status.contains("approved") || status.contains("closed") {
        return WorkUnitStatus::Completed;
    }
    if status.contains("progress") || status.contains("active") || status.contains("ongoing") {
        return WorkUnitStatus::InProgress;
    }
    if status.contains("blocked") || status.contains("hold") || status.contains("rejected") {
        return WorkUnitStatus::Blocked;
    }
    WorkUnitStatus::NotStarted
}

/// Upsert a work unit for a source record and wire it per the matching
/// blueprint. Best-effort: every failure is logged and swallowed, and
/// `None` means tracking did not happen.
pub async fn sync_work_unit(store: &mut dyn OpsStore, new: NewWorkUnit) -> Option<WorkUnit> {
    let source_ref = new.source_ref.clone();

    let unit = match store.upsert_work_unit(new).await {
        Ok(unit) => unit,
        Err(e) => {
            warn!(source_ref = %source_ref, error = %e, "work unit sync failed");
            return None;
        }
    };

    // Wiring failures don't lose the unit itself
    if let Err(e) = apply_blueprint(store, &unit).await {
        warn!(unit = %unit.id, error = %e, "blueprint wiring failed");
    }

    debug!(unit = %unit.id, source_ref = %source_ref, "work unit synced");
    Some(unit)
}

/// Propagate a source record's status change onto its work unit.
/// Best-effort; a missing unit or an unchanged status is a quiet no-op.
pub async fn sync_status_update(
    store: &mut dyn OpsStore,
    source_ref: &SourceRef,
    source_status: &str,
) -> Option<WorkUnit> {
    let unit = match store.find_by_source_ref(source_ref).await {
        Ok(Some(unit)) => unit,
        Ok(None) => {
            debug!(source_ref = %source_ref, "no work unit tracks this record");
            return None;
        }
        Err(e) => {
            warn!(source_ref = %source_ref, error = %e, "status sync lookup failed");
            return None;
        }
    };

    let mapped = map_source_status(source_status);
    if unit.status == mapped {
        return Some(unit);
    }

    let update = WorkUnitUpdate {
        status: Some(mapped),
        ..WorkUnitUpdate::default()
    };
    match store.update_work_unit(&unit.id, update).await {
        Ok(updated) => {
            debug!(
                unit = %updated.id,
                from = ?unit.status,
                to = ?updated.status,
                "status synced"
            );
            Some(updated)
        }
        Err(e) => {
            warn!(unit = %unit.id, error = %e, "status sync failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_keywords_map_to_terminal_states() {
        assert_eq!(map_source_status("Completed"), WorkUnitStatus::Completed);
        assert_eq!(map_source_status("APPROVED"), WorkUnitStatus::Completed);
        assert_eq!(map_source_status("Closed - Won"), WorkUnitStatus::Completed);
    }

    #[test]
    fn status_keywords_map_to_in_progress() {
        assert_eq!(map_source_status("In Progress"), WorkUnitStatus::InProgress);
        assert_eq!(map_source_status("active"), WorkUnitStatus::InProgress);
        assert_eq!(map_source_status("Ongoing review"), WorkUnitStatus::InProgress);
    }

    #[test]
    fn status_keywords_map_to_blocked() {
        assert_eq!(map_source_status("Blocked"), WorkUnitStatus::Blocked);
        assert_eq!(map_source_status("On Hold"), WorkUnitStatus::Blocked);
        assert_eq!(map_source_status("Rejected"), WorkUnitStatus::Blocked);
    }

    #[test]
    fn unknown_statuses_default_to_not_started() {
        assert_eq!(map_source_status("Pending"), WorkUnitStatus::NotStarted);
        assert_eq!(map_source_status("Draft"), WorkUnitStatus::NotStarted);
        assert_eq!(map_source_status(""), WorkUnitStatus::NotStarted);
    }
}
