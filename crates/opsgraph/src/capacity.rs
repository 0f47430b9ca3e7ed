//! Resource load versus capacity.
//!
//! Pure calculations over slices of work units: how much demand a resource
//! carries in a time window (each unit's cost prorated by how much of its
//! planned span falls inside the window) and how that compares to recorded
//! supply.

use crate::domain::{ProjectId, ResourceId, Severity, WorkUnit, WorkUnitId, WorkUnitStatus};
use chrono::NaiveDate;
use serde::Serialize;

/// Utilization thresholds for overload classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CapacityBands {
    /// Utilization at or above this is high severity.
    pub high: f64,

    /// Utilization at or above this is critical severity.
    pub critical: f64,
}

impl Default for CapacityBands {
    fn default() -> Self {
        Self {
            high: 0.85,
            critical: 1.0,
        }
    }
}

impl CapacityBands {
    /// Classify a utilization ratio, or `None` when it is unremarkable.
    pub fn classify(&self, utilization: f64) -> Option<Severity> {
        if utilization >= self.critical {
            Some(Severity::Critical)
        } else if utilization >= self.high {
            Some(Severity::High)
        } else {
            None
        }
    }
}

/// One unit's prorated contribution to a resource's load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadContribution {
    /// Contributing work unit.
    pub work_unit_id: WorkUnitId,

    /// Project of the contributing unit.
    pub project_id: ProjectId,

    /// Prorated cost falling inside the window.
    pub amount: f64,
}

/// A resource's aggregate demand over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceLoad {
    /// The resource.
    pub resource_id: ResourceId,

    /// Window start (inclusive).
    pub period_start: NaiveDate,

    /// Window end (inclusive).
    pub period_end: NaiveDate,

    /// Total prorated demand.
    pub total: f64,

    /// Per-unit contributions, largest first.
    pub contributions: Vec<LoadContribution>,
}

impl ResourceLoad {
    /// Project contributing the most load, if any work contributes at all.
    pub fn dominant_project(&self) -> Option<&ProjectId> {
        self.contributions.first().map(|c| &c.project_id)
    }
}

/// Inclusive day count of a date span. A same-day span counts as one day;
/// an inverted span counts as zero.
pub fn span_days(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end - start).num_days() + 1).max(0)
}

/// Inclusive day count of the intersection of two spans.
pub fn overlap_days(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> i64 {
    span_days(a_start.max(b_start), a_end.min(b_end))
}

/// Prorated load on `resource_id` over `[period_start, period_end]`.
///
/// Sums `unit_cost × overlap/span` over live, not-yet-completed units owned
/// by the resource whose planned span intersects the window. A unit
/// entirely inside the window contributes its full cost.
pub fn compute_load(
    units: &[WorkUnit],
    resource_id: &ResourceId,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> ResourceLoad {
    let mut contributions: Vec<LoadContribution> = units
        .iter()
        .filter(|u| {
            u.is_live()
                && u.status != WorkUnitStatus::Completed
                && u.owner_resource_id.as_ref() == Some(resource_id)
        })
        .filter_map(|u| {
            let span = span_days(u.planned_start, u.planned_end);
            if span == 0 {
                return None;
            }
            let overlap = overlap_days(u.planned_start, u.planned_end, period_start, period_end);
            if overlap == 0 {
                return None;
            }
            let amount = u.unit_cost * (overlap as f64 / span as f64);
            (amount > 0.0).then(|| LoadContribution {
                work_unit_id: u.id.clone(),
                project_id: u.project_id.clone(),
                amount,
            })
        })
        .collect();

    contributions.sort_by(|a, b| b.amount.total_cmp(&a.amount));

    ResourceLoad {
        resource_id: resource_id.clone(),
        period_start,
        period_end,
        total: contributions.iter().map(|c| c.amount).sum(),
        contributions,
    }
}

/// Utilization ratio of load over capacity. Zero or negative capacity has
/// no meaningful ratio.
pub fn utilization(load: f64, capacity: f64) -> Option<f64> {
    (capacity > 0.0).then(|| load / capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SourceRef, WorkUnitKind};
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn owned_unit(id: &str, start: &str, end: &str, cost: f64, owner: &str) -> WorkUnit {
        let now = Utc::now();
        WorkUnit {
            id: WorkUnitId::new(id),
            project_id: ProjectId::new("proj-1"),
            kind: WorkUnitKind::Production,
            status: WorkUnitStatus::InProgress,
            planned_start: date(start),
            planned_end: date(end),
            actual_start: None,
            actual_end: None,
            source_ref: SourceRef::new("task", id),
            owner_resource_id: Some(ResourceId::new(owner)),
            unit_cost: cost,
            structure_hint: None,
            created_at: now,
            updated_at: now,
            retired_at: None,
        }
    }

    #[test]
    fn fully_contained_unit_contributes_full_cost() {
        let units = vec![owned_unit("a", "2026-03-05", "2026-03-10", 40.0, "res-1")];
        let load = compute_load(
            &units,
            &ResourceId::new("res-1"),
            date("2026-03-01"),
            date("2026-03-31"),
        );
        assert!((load.total - 40.0).abs() < 1e-9);
    }

    #[test]
    fn straddling_unit_is_prorated_by_overlap() {
        // 10-day span (inclusive), 5 days inside the window: half the cost
        let units = vec![owned_unit("a", "2026-02-24", "2026-03-05", 80.0, "res-1")];
        let load = compute_load(
            &units,
            &ResourceId::new("res-1"),
            date("2026-03-01"),
            date("2026-03-31"),
        );
        assert!((load.total - 40.0).abs() < 1e-9);
    }

    #[test]
    fn other_owners_and_completed_units_are_excluded() {
        let mut done = owned_unit("b", "2026-03-01", "2026-03-10", 30.0, "res-1");
        done.status = WorkUnitStatus::Completed;

        let units = vec![
            owned_unit("a", "2026-03-01", "2026-03-10", 20.0, "res-1"),
            owned_unit("c", "2026-03-01", "2026-03-10", 50.0, "res-2"),
            done,
        ];
        let load = compute_load(
            &units,
            &ResourceId::new("res-1"),
            date("2026-03-01"),
            date("2026-03-31"),
        );
        assert!((load.total - 20.0).abs() < 1e-9);
        assert_eq!(load.contributions.len(), 1);
    }

    #[test]
    fn dominant_project_is_largest_contributor() {
        let mut big = owned_unit("big", "2026-03-01", "2026-03-10", 60.0, "res-1");
        big.project_id = ProjectId::new("proj-big");
        let small = owned_unit("small", "2026-03-01", "2026-03-10", 10.0, "res-1");

        let load = compute_load(
            &[small, big],
            &ResourceId::new("res-1"),
            date("2026-03-01"),
            date("2026-03-31"),
        );
        assert_eq!(load.dominant_project().unwrap().as_str(), "proj-big");
    }

    #[test]
    fn bands_classify_at_thresholds() {
        let bands = CapacityBands::default();
        assert_eq!(bands.classify(0.5), None);
        assert_eq!(bands.classify(0.95), Some(Severity::High));
        assert_eq!(bands.classify(0.85), Some(Severity::High));
        assert_eq!(bands.classify(1.0), Some(Severity::Critical));
        assert_eq!(bands.classify(1.31), Some(Severity::Critical));
    }

    #[test]
    fn utilization_requires_positive_capacity() {
        assert_eq!(utilization(95.0, 100.0), Some(0.95));
        assert_eq!(utilization(95.0, 0.0), None);
        assert_eq!(utilization(95.0, -5.0), None);
    }
}
