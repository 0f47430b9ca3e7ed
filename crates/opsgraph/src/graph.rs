//! Pure dependency-graph analysis over an immutable snapshot.
//!
//! A [`GraphSnapshot`] is built from live work units and their edges at the
//! start of an analysis (one query, one traversal) and then answers
//! downstream, slack, delay-propagation and critical-path questions without
//! touching storage. Acyclicity is a storage invariant, so traversals here
//! assume a DAG; a snapshot that somehow contains a cycle simply leaves the
//! cyclic nodes out of the topological order.

use crate::domain::{Dependency, DependencyKind, WorkUnit, WorkUnitId, WorkUnitStatus};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// Projected effect of a delay on one downstream work unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayImpact {
    /// The affected successor.
    pub work_unit_id: WorkUnitId,

    /// Days of delay that survive slack absorption on the way here.
    pub projected_delay_days: i64,

    /// Planned start shifted by the projected delay.
    pub new_planned_start: NaiveDate,

    /// Planned end shifted by the projected delay.
    pub new_planned_finish: NaiveDate,
}

/// Immutable view of one project's (or the whole store's) live graph.
#[derive(Debug)]
pub struct GraphSnapshot {
    units: Vec<WorkUnit>,
    index: HashMap<WorkUnitId, usize>,
    edges: Vec<Dependency>,
    /// Per node: indices into `edges` where the node is the successor.
    preds: Vec<Vec<usize>>,
    /// Per node: indices into `edges` where the node is the predecessor.
    succs: Vec<Vec<usize>>,
}

impl GraphSnapshot {
    /// Build a snapshot from live units and their edges.
    ///
    /// Retired units are dropped, along with any edge touching a unit that
    /// is retired or absent.
    pub fn build(units: Vec<WorkUnit>, edges: Vec<Dependency>) -> Self {
        let units: Vec<WorkUnit> = units.into_iter().filter(WorkUnit::is_live).collect();
        let index: HashMap<WorkUnitId, usize> = units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.id.clone(), i))
            .collect();

        let edges: Vec<Dependency> = edges
            .into_iter()
            .filter(|e| index.contains_key(&e.from) && index.contains_key(&e.to))
            .collect();

        let mut preds = vec![Vec::new(); units.len()];
        let mut succs = vec![Vec::new(); units.len()];
        for (ei, edge) in edges.iter().enumerate() {
            succs[index[&edge.from]].push(ei);
            preds[index[&edge.to]].push(ei);
        }

        Self {
            units,
            index,
            edges,
            preds,
            succs,
        }
    }

    /// Number of live units in the snapshot.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the snapshot has no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The live units, in insertion order.
    pub fn units(&self) -> &[WorkUnit] {
        &self.units
    }

    /// Look up a unit by id.
    pub fn unit(&self, id: &WorkUnitId) -> Option<&WorkUnit> {
        self.index.get(id).map(|&i| &self.units[i])
    }

    /// Whether the snapshot contains the given unit.
    pub fn contains(&self, id: &WorkUnitId) -> bool {
        self.index.contains_key(id)
    }

    /// Edges whose successor is `id`.
    pub fn incoming(&self, id: &WorkUnitId) -> impl Iterator<Item = &Dependency> {
        self.index
            .get(id)
            .into_iter()
            .flat_map(|&i| self.preds[i].iter().map(|&ei| &self.edges[ei]))
    }

    /// Edges whose predecessor is `id`.
    pub fn outgoing(&self, id: &WorkUnitId) -> impl Iterator<Item = &Dependency> {
        self.index
            .get(id)
            .into_iter()
            .flat_map(|&i| self.succs[i].iter().map(|&ei| &self.edges[ei]))
    }

    /// All work units transitively downstream of `root`, breadth-first,
    /// excluding `root` itself. Each unit appears once even when reachable
    /// along several paths.
    pub fn downstream(&self, root: &WorkUnitId) -> Vec<WorkUnitId> {
        let Some(&start) = self.index.get(root) else {
            return Vec::new();
        };

        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();

        while let Some(node) = queue.pop_front() {
            for &ei in &self.succs[node] {
                let next = self.index[&self.edges[ei].to];
                if seen.insert(next) {
                    out.push(self.units[next].id.clone());
                    queue.push_back(next);
                }
            }
        }

        out
    }

    /// Scheduling slack of an edge, in days.
    ///
    /// Slack is the gap between when the plan says the successor's anchor
    /// date falls and the earliest the edge would allow it: positive slack
    /// absorbs that many days of predecessor delay before the successor is
    /// affected at all.
    pub fn edge_slack(&self, edge: &Dependency) -> Option<i64> {
        let from = self.unit(&edge.from)?;
        let to = self.unit(&edge.to)?;
        Some(edge_slack_days(from, to, edge))
    }

    /// Project `incoming_delay_days` of delay on `root` through the graph.
    ///
    /// Each edge absorbs up to its slack; a successor reachable along
    /// several paths takes the worst surviving delay, not the sum. The
    /// result lists only successors with a positive projected delay, in
    /// dependency order, and never includes `root` itself.
    pub fn delay_impact(&self, root: &WorkUnitId, incoming_delay_days: i64) -> Vec<DelayImpact> {
        let Some(&start) = self.index.get(root) else {
            return Vec::new();
        };
        if incoming_delay_days <= 0 {
            return Vec::new();
        }

        let mut delays = vec![0i64; self.units.len()];
        delays[start] = incoming_delay_days;

        let order = self.topo_order();
        let mut out = Vec::new();

        for &node in &order {
            if node == start {
                continue;
            }
            let mut worst = 0i64;
            for &ei in &self.preds[node] {
                let edge = &self.edges[ei];
                let pred = self.index[&edge.from];
                if delays[pred] <= 0 {
                    continue;
                }
                let slack = edge_slack_days(&self.units[pred], &self.units[node], edge);
                worst = worst.max((delays[pred] - slack.max(0)).max(0));
            }
            if worst > 0 {
                delays[node] = worst;
                let unit = &self.units[node];
                out.push(DelayImpact {
                    work_unit_id: unit.id.clone(),
                    projected_delay_days: worst,
                    new_planned_start: unit.planned_start + Duration::days(worst),
                    new_planned_finish: unit.planned_end + Duration::days(worst),
                });
            }
        }

        out
    }

    /// The longest chain through the snapshot by summed planned duration.
    ///
    /// This is the planning-time critical path: the sequence of units whose
    /// slippage moves the overall finish date. Returns the chain from first
    /// to last unit; empty when the snapshot is empty.
    pub fn critical_path(&self) -> Vec<WorkUnitId> {
        if self.units.is_empty() {
            return Vec::new();
        }

        let order = self.topo_order();
        let mut dist = vec![0i64; self.units.len()];
        let mut best_pred: Vec<Option<usize>> = vec![None; self.units.len()];

        for &node in &order {
            let own = self.units[node].planned_duration_days();
            let mut best = own;
            for &ei in &self.preds[node] {
                let pred = self.index[&self.edges[ei].from];
                let via = dist[pred] + own;
                if via > best {
                    best = via;
                    best_pred[node] = Some(pred);
                }
            }
            dist[node] = best;
        }

        let Some(&end) = order.iter().max_by_key(|&&n| dist[n]) else {
            return Vec::new();
        };

        let mut chain = Vec::new();
        let mut cursor = Some(end);
        while let Some(node) = cursor {
            chain.push(self.units[node].id.clone());
            cursor = best_pred[node];
        }
        chain.reverse();
        chain
    }

    /// Kahn topological order over node indices. Nodes on a cycle (which
    /// storage should never produce) are omitted.
    fn topo_order(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self.preds.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.units.len());
        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &ei in &self.succs[node] {
                let next = self.index[&self.edges[ei].to];
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        order
    }
}

/// Slack of one edge in days: how late the predecessor's anchor may run
/// before the successor's planned anchor date is threatened.
fn edge_slack_days(from: &WorkUnit, to: &WorkUnit, edge: &Dependency) -> i64 {
    let (pred_anchor, succ_anchor) = match edge.kind {
        DependencyKind::FinishToStart => (from.planned_end, to.planned_start),
        DependencyKind::StartToStart => (from.planned_start, to.planned_start),
        DependencyKind::FinishToFinish => (from.planned_end, to.planned_end),
    };
    (succ_anchor - pred_anchor).num_days() - edge.lag_days
}

/// Observed finish slip of a unit as of `today`, in days, never negative.
///
/// A finished unit's slip is fixed by its actual end; an unfinished unit
/// past its planned end slips one more day each day. Completed-on-time and
/// not-yet-due units have zero slip.
pub fn observed_finish_slip(unit: &WorkUnit, today: NaiveDate) -> i64 {
    match unit.actual_end {
        Some(actual) => (actual - unit.planned_end).num_days().max(0),
        None if unit.status != WorkUnitStatus::Completed && today > unit.planned_end => {
            (today - unit.planned_end).num_days()
        }
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        DependencyId, ProjectId, SourceRef, WorkUnitKind, WorkUnitStatus,
    };
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn unit(id: &str, start: &str, end: &str) -> WorkUnit {
        let now = Utc::now();
        WorkUnit {
            id: WorkUnitId::new(id),
            project_id: ProjectId::new("proj-1"),
            kind: WorkUnitKind::Production,
            status: WorkUnitStatus::NotStarted,
            planned_start: date(start),
            planned_end: date(end),
            actual_start: None,
            actual_end: None,
            source_ref: SourceRef::new("task", id),
            owner_resource_id: None,
            unit_cost: 0.0,
            structure_hint: None,
            created_at: now,
            updated_at: now,
            retired_at: None,
        }
    }

    fn edge(id: &str, from: &str, to: &str, kind: DependencyKind, lag: i64) -> Dependency {
        Dependency {
            id: DependencyId::new(id),
            from: WorkUnitId::new(from),
            to: WorkUnitId::new(to),
            kind,
            lag_days: lag,
        }
    }

    fn fs(id: &str, from: &str, to: &str) -> Dependency {
        edge(id, from, to, DependencyKind::FinishToStart, 0)
    }

    #[test]
    fn downstream_visits_each_unit_once() {
        // a -> b -> d, a -> c -> d (diamond)
        let snapshot = GraphSnapshot::build(
            vec![
                unit("a", "2026-01-01", "2026-01-05"),
                unit("b", "2026-01-06", "2026-01-10"),
                unit("c", "2026-01-06", "2026-01-12"),
                unit("d", "2026-01-13", "2026-01-20"),
            ],
            vec![
                fs("e1", "a", "b"),
                fs("e2", "a", "c"),
                fs("e3", "b", "d"),
                fs("e4", "c", "d"),
            ],
        );

        let downstream = snapshot.downstream(&WorkUnitId::new("a"));
        assert_eq!(downstream.len(), 3);
        assert_eq!(
            downstream.iter().filter(|id| id.as_str() == "d").count(),
            1
        );
    }

    #[test]
    fn slack_absorbs_small_delays_entirely() {
        // b starts 5 days after a ends: slack 5 swallows a 3-day delay
        let snapshot = GraphSnapshot::build(
            vec![
                unit("a", "2026-01-01", "2026-01-10"),
                unit("b", "2026-01-15", "2026-01-25"),
            ],
            vec![fs("e1", "a", "b")],
        );

        let impacts = snapshot.delay_impact(&WorkUnitId::new("a"), 3);
        assert!(impacts.is_empty());
    }

    #[test]
    fn delay_beyond_slack_cascades_the_difference() {
        // slack 5, delay 8: b is pushed by 3 days
        let snapshot = GraphSnapshot::build(
            vec![
                unit("a", "2026-01-01", "2026-01-10"),
                unit("b", "2026-01-15", "2026-01-25"),
            ],
            vec![fs("e1", "a", "b")],
        );

        let impacts = snapshot.delay_impact(&WorkUnitId::new("a"), 8);
        assert_eq!(impacts.len(), 1);
        assert_eq!(impacts[0].work_unit_id.as_str(), "b");
        assert_eq!(impacts[0].projected_delay_days, 3);
        assert_eq!(impacts[0].new_planned_start, date("2026-01-18"));
        assert_eq!(impacts[0].new_planned_finish, date("2026-01-28"));
    }

    #[test]
    fn lag_consumes_slack() {
        // Calendar gap 5, lag 5: zero effective slack, full delay cascades
        let snapshot = GraphSnapshot::build(
            vec![
                unit("a", "2026-01-01", "2026-01-10"),
                unit("b", "2026-01-15", "2026-01-25"),
            ],
            vec![edge("e1", "a", "b", DependencyKind::FinishToStart, 5)],
        );

        let impacts = snapshot.delay_impact(&WorkUnitId::new("a"), 4);
        assert_eq!(impacts.len(), 1);
        assert_eq!(impacts[0].projected_delay_days, 4);
    }

    #[test]
    fn converging_paths_take_worst_delay_not_sum() {
        // a -> b -> d (per-edge slack 0) and a -> c -> d (slack 4 on c -> d):
        // d must see max(8, 4), never 12
        let snapshot = GraphSnapshot::build(
            vec![
                unit("a", "2026-01-01", "2026-01-10"),
                unit("b", "2026-01-10", "2026-01-20"),
                unit("c", "2026-01-10", "2026-01-16"),
                unit("d", "2026-01-20", "2026-01-30"),
            ],
            vec![
                fs("e1", "a", "b"),
                fs("e2", "a", "c"),
                fs("e3", "b", "d"),
                fs("e4", "c", "d"),
            ],
        );

        let impacts = snapshot.delay_impact(&WorkUnitId::new("a"), 8);
        let d_impact = impacts
            .iter()
            .find(|i| i.work_unit_id.as_str() == "d")
            .unwrap();
        assert_eq!(d_impact.projected_delay_days, 8);
    }

    #[test]
    fn nonpositive_delay_projects_nothing() {
        let snapshot = GraphSnapshot::build(
            vec![
                unit("a", "2026-01-01", "2026-01-10"),
                unit("b", "2026-01-10", "2026-01-20"),
            ],
            vec![fs("e1", "a", "b")],
        );

        assert!(snapshot.delay_impact(&WorkUnitId::new("a"), 0).is_empty());
        assert!(snapshot.delay_impact(&WorkUnitId::new("a"), -3).is_empty());
    }

    #[test]
    fn start_to_start_slack_uses_start_anchors() {
        let snapshot = GraphSnapshot::build(
            vec![
                unit("a", "2026-01-01", "2026-01-10"),
                unit("b", "2026-01-04", "2026-01-20"),
            ],
            vec![edge("e1", "a", "b", DependencyKind::StartToStart, 0)],
        );

        // starts 3 days apart: slack 3
        let slack = snapshot.edge_slack(&snapshot.edges[0]).unwrap();
        assert_eq!(slack, 3);
    }

    #[test]
    fn critical_path_picks_longest_duration_chain() {
        // a(9) -> b(10) -> d(10) totals 29; a(9) -> c(2) -> d(10) totals 21
        let snapshot = GraphSnapshot::build(
            vec![
                unit("a", "2026-01-01", "2026-01-10"),
                unit("b", "2026-01-10", "2026-01-20"),
                unit("c", "2026-01-10", "2026-01-12"),
                unit("d", "2026-01-20", "2026-01-30"),
            ],
            vec![
                fs("e1", "a", "b"),
                fs("e2", "a", "c"),
                fs("e3", "b", "d"),
                fs("e4", "c", "d"),
            ],
        );

        let path = snapshot.critical_path();
        let chain: Vec<&str> = path.iter().map(|id| id.as_str()).collect();
        assert_eq!(chain, vec!["a", "b", "d"]);
    }

    #[test]
    fn retired_units_are_excluded() {
        let mut retired = unit("b", "2026-01-10", "2026-01-20");
        retired.retired_at = Some(Utc::now());

        let snapshot = GraphSnapshot::build(
            vec![unit("a", "2026-01-01", "2026-01-10"), retired],
            vec![fs("e1", "a", "b")],
        );

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.downstream(&WorkUnitId::new("a")).is_empty());
    }

    #[test]
    fn finish_slip_tracks_actuals_and_today() {
        let mut u = unit("a", "2026-01-01", "2026-01-10");

        // Not yet due
        assert_eq!(observed_finish_slip(&u, date("2026-01-05")), 0);

        // Overdue and unfinished: slips with the calendar
        assert_eq!(observed_finish_slip(&u, date("2026-01-14")), 4);

        // Finished late: fixed by actuals
        u.actual_end = Some(date("2026-01-12"));
        u.status = WorkUnitStatus::Completed;
        assert_eq!(observed_finish_slip(&u, date("2026-02-01")), 2);

        // Finished early: never negative
        u.actual_end = Some(date("2026-01-08"));
        assert_eq!(observed_finish_slip(&u, date("2026-02-01")), 0);
    }
}
