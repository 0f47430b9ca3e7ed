//! OpsStore trait implementation for the in-memory backend.

use super::InMemoryStore;
use crate::domain::{
    Dependency, DependencyBlueprint, DependencyKind, NewCapacity, NewWorkUnit, ProjectId,
    ResourceCapacity, ResourceId, RiskCandidate, RiskEvent, RiskEventFilter, RiskRule, SourceRef,
    WorkUnit, WorkUnitFilter, WorkUnitId, WorkUnitStatus, WorkUnitUpdate,
};
use crate::error::{Error, Result};
use crate::storage::{OpsStore, RuleCommit, Snapshot};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Stamp actuals implied by a status transition. Explicit actual dates in
/// an update are applied afterwards and win.
fn stamp_actuals(unit: &mut WorkUnit, status: WorkUnitStatus, today: NaiveDate) {
    if status == WorkUnitStatus::InProgress && unit.actual_start.is_none() {
        unit.actual_start = Some(today);
    }
    if status == WorkUnitStatus::Completed && unit.actual_end.is_none() {
        unit.actual_end = Some(today);
    }
}

fn matches_filter(unit: &WorkUnit, filter: &WorkUnitFilter) -> bool {
    if !filter.include_retired && !unit.is_live() {
        return false;
    }
    if let Some(project_id) = &filter.project_id {
        if &unit.project_id != project_id {
            return false;
        }
    }
    if let Some(kind) = filter.kind {
        if unit.kind != kind {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if unit.status != status {
            return false;
        }
    }
    if let Some(owner) = &filter.owner_resource_id {
        if unit.owner_resource_id.as_ref() != Some(owner) {
            return false;
        }
    }
    if let Some(from) = filter.planned_start_from {
        if unit.planned_start < from {
            return false;
        }
    }
    if let Some(to) = filter.planned_start_to {
        if unit.planned_start > to {
            return false;
        }
    }
    if let Some(from) = filter.planned_end_from {
        if unit.planned_end < from {
            return false;
        }
    }
    if let Some(to) = filter.planned_end_to {
        if unit.planned_end > to {
            return false;
        }
    }
    true
}

#[async_trait]
impl OpsStore for InMemoryStore {
    async fn upsert_work_unit(&mut self, new: NewWorkUnit) -> Result<WorkUnit> {
        let mut inner = self.lock().await;
        let now = Utc::now();
        let today = now.date_naive();

        let source_key = (
            new.source_ref.entity_kind.clone(),
            new.source_ref.entity_id.clone(),
        );

        if let Some(existing_id) = inner.by_source.get(&source_key).cloned() {
            let unit = inner
                .units
                .get_mut(&existing_id)
                .ok_or_else(|| Error::WorkUnitNotFound(existing_id.clone()))?;

            unit.project_id = new.project_id;
            unit.kind = new.kind;
            unit.planned_start = new.planned_start;
            unit.planned_end = new.planned_end;
            if let Some(status) = new.status {
                stamp_actuals(unit, status, today);
                unit.status = status;
            }
            if new.actual_start.is_some() {
                unit.actual_start = new.actual_start;
            }
            if new.actual_end.is_some() {
                unit.actual_end = new.actual_end;
            }
            unit.owner_resource_id = new.owner_resource_id;
            unit.unit_cost = new.unit_cost;
            unit.structure_hint = new.structure_hint;
            // A re-synced source record revives a retired unit
            unit.retired_at = None;
            unit.updated_at = now;

            return Ok(unit.clone());
        }

        let id = inner.generate_unit_id(&new.source_ref.to_string())?;
        let status = new.status.unwrap_or(WorkUnitStatus::NotStarted);
        let mut unit = WorkUnit {
            id,
            project_id: new.project_id,
            kind: new.kind,
            status,
            planned_start: new.planned_start,
            planned_end: new.planned_end,
            actual_start: new.actual_start,
            actual_end: new.actual_end,
            source_ref: new.source_ref,
            owner_resource_id: new.owner_resource_id,
            unit_cost: new.unit_cost,
            structure_hint: new.structure_hint,
            created_at: now,
            updated_at: now,
            retired_at: None,
        };
        stamp_actuals(&mut unit, status, today);

        inner.insert_unit(unit.clone());
        Ok(unit)
    }

    async fn get_work_unit(&self, id: &WorkUnitId) -> Result<Option<WorkUnit>> {
        let inner = self.lock().await;
        // Retired units stay in the map for edge history but are invisible
        // to reads; only an upsert on the same source ref revives one.
        Ok(inner.units.get(id).filter(|u| u.is_live()).cloned())
    }

    async fn find_by_source_ref(&self, source_ref: &SourceRef) -> Result<Option<WorkUnit>> {
        let inner = self.lock().await;
        let key = (source_ref.entity_kind.clone(), source_ref.entity_id.clone());
        Ok(inner
            .by_source
            .get(&key)
            .and_then(|id| inner.units.get(id))
            .filter(|u| u.is_live())
            .cloned())
    }

    async fn update_work_unit(
        &mut self,
        id: &WorkUnitId,
        update: WorkUnitUpdate,
    ) -> Result<WorkUnit> {
        let mut inner = self.lock().await;
        let now = Utc::now();
        let today = now.date_naive();

        let unit = inner
            .units
            .get_mut(id)
            .ok_or_else(|| Error::WorkUnitNotFound(id.clone()))?;

        if let Some(status) = update.status {
            stamp_actuals(unit, status, today);
            unit.status = status;
        }
        if let Some(planned_start) = update.planned_start {
            unit.planned_start = planned_start;
        }
        if let Some(planned_end) = update.planned_end {
            unit.planned_end = planned_end;
        }
        if update.actual_start.is_some() {
            unit.actual_start = update.actual_start;
        }
        if update.actual_end.is_some() {
            unit.actual_end = update.actual_end;
        }
        if let Some(owner) = update.owner_resource_id {
            unit.owner_resource_id = owner;
        }
        if let Some(unit_cost) = update.unit_cost {
            unit.unit_cost = unit_cost;
        }
        unit.updated_at = now;

        Ok(unit.clone())
    }

    async fn list_work_units(&self, filter: &WorkUnitFilter) -> Result<Vec<WorkUnit>> {
        let inner = self.lock().await;
        let mut units: Vec<WorkUnit> = inner
            .units
            .values()
            .filter(|u| matches_filter(u, filter))
            .cloned()
            .collect();

        units.sort_by(|a, b| {
            a.planned_start
                .cmp(&b.planned_start)
                .then_with(|| a.id.cmp(&b.id))
        });

        if let Some(limit) = filter.limit {
            units.truncate(limit);
        }
        Ok(units)
    }

    async fn remove_work_unit(&mut self, id: &WorkUnitId) -> Result<()> {
        let mut inner = self.lock().await;

        if !inner.units.contains_key(id) {
            return Err(Error::WorkUnitNotFound(id.clone()));
        }

        if inner.has_edges(id) {
            // Edge history must stay intact: soft-close instead of delete
            let now = Utc::now();
            if let Some(unit) = inner.units.get_mut(id) {
                unit.retired_at = Some(now);
                unit.updated_at = now;
            }
            return Ok(());
        }

        if let Some(unit) = inner.units.remove(id) {
            let key = (
                unit.source_ref.entity_kind.clone(),
                unit.source_ref.entity_id.clone(),
            );
            inner.by_source.remove(&key);
        }
        inner.remove_node(id);
        Ok(())
    }

    async fn add_dependency(
        &mut self,
        from: &WorkUnitId,
        to: &WorkUnitId,
        kind: DependencyKind,
        lag_days: i64,
    ) -> Result<Dependency> {
        let mut inner = self.lock().await;
        inner.add_edge_checked(from, to, kind, lag_days)
    }

    async fn remove_dependency(&mut self, from: &WorkUnitId, to: &WorkUnitId) -> Result<()> {
        let mut inner = self.lock().await;

        let dep_id = inner
            .dependencies
            .values()
            .find(|d| &d.from == from && &d.to == to)
            .map(|d| d.id.clone())
            .ok_or_else(|| Error::DependencyNotFound {
                from: from.clone(),
                to: to.clone(),
            })?;

        inner.dependencies.remove(&dep_id);
        inner.edge_keys.remove(&(from.clone(), to.clone()));

        if let (Some(&from_node), Some(&to_node)) =
            (inner.node_map.get(from), inner.node_map.get(to))
        {
            if let Some(edge) = inner.graph.find_edge(from_node, to_node) {
                inner.graph.remove_edge(edge);
            }
        }
        Ok(())
    }

    async fn list_dependencies(&self, project_id: Option<&ProjectId>) -> Result<Vec<Dependency>> {
        let inner = self.lock().await;
        let mut deps: Vec<Dependency> = inner
            .dependencies
            .values()
            .filter(|d| match project_id {
                Some(project) => inner
                    .units
                    .get(&d.from)
                    .is_some_and(|u| &u.project_id == project),
                None => true,
            })
            .cloned()
            .collect();
        deps.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(deps)
    }

    async fn dependencies_of(
        &self,
        id: &WorkUnitId,
    ) -> Result<(Vec<Dependency>, Vec<Dependency>)> {
        let inner = self.lock().await;
        inner.live_unit(id)?;

        let mut incoming = Vec::new();
        let mut outgoing = Vec::new();
        for dep in inner.dependencies.values() {
            if &dep.to == id {
                incoming.push(dep.clone());
            }
            if &dep.from == id {
                outgoing.push(dep.clone());
            }
        }
        incoming.sort_by(|a, b| a.id.cmp(&b.id));
        outgoing.sort_by(|a, b| a.id.cmp(&b.id));
        Ok((incoming, outgoing))
    }

    async fn record_capacity(&mut self, new: NewCapacity) -> Result<ResourceCapacity> {
        let mut inner = self.lock().await;

        let id = inner.generate_cap_id(&format!("{}@{}", new.resource_id, new.period_start))?;
        let capacity = ResourceCapacity {
            id,
            resource_id: new.resource_id.clone(),
            resource_kind: new.resource_kind,
            unit: new.unit,
            period_start: new.period_start,
            period_end: new.period_end,
            capacity_value: new.capacity_value,
            created_at: Utc::now(),
        };

        inner
            .capacities
            .insert((new.resource_id, new.period_start), capacity.clone());
        Ok(capacity)
    }

    async fn list_capacities(
        &self,
        resource_id: Option<&ResourceId>,
    ) -> Result<Vec<ResourceCapacity>> {
        let inner = self.lock().await;
        let mut capacities: Vec<ResourceCapacity> = inner
            .capacities
            .values()
            .filter(|c| resource_id.is_none_or(|r| &c.resource_id == r))
            .cloned()
            .collect();
        capacities.sort_by(|a, b| {
            a.resource_id
                .cmp(&b.resource_id)
                .then_with(|| a.period_start.cmp(&b.period_start))
        });
        Ok(capacities)
    }

    async fn insert_risk_event(
        &mut self,
        candidate: RiskCandidate,
        now: DateTime<Utc>,
    ) -> Result<RiskEvent> {
        let mut inner = self.lock().await;
        inner.insert_risk(candidate, now)
    }

    async fn touch_risk_event(
        &mut self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RiskEvent>> {
        let mut inner = self.lock().await;
        Ok(inner.touch_by_fingerprint(fingerprint, now))
    }

    async fn resolve_risk_event(
        &mut self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RiskEvent>> {
        let mut inner = self.lock().await;
        Ok(inner.resolve_risk(fingerprint, now))
    }

    async fn open_risk_events(&self, rule: Option<RiskRule>) -> Result<Vec<RiskEvent>> {
        let inner = self.lock().await;
        let mut events: Vec<RiskEvent> = inner
            .risks
            .values()
            .filter(|e| e.is_open() && rule.is_none_or(|r| e.rule == r))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.detected_at.cmp(&b.detected_at).then_with(|| a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn list_risk_events(&self, filter: &RiskEventFilter) -> Result<Vec<RiskEvent>> {
        let inner = self.lock().await;
        let mut events: Vec<RiskEvent> = inner
            .risks
            .values()
            .filter(|e| {
                e.is_open()
                    && filter.severity.is_none_or(|s| e.severity == s)
                    && filter.rule.is_none_or(|r| e.rule == r)
                    && filter
                        .project_id
                        .as_ref()
                        .is_none_or(|p| &e.project_id == p)
            })
            .cloned()
            .collect();
        // Most severe first, then most recently seen
        events.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.last_seen_at.cmp(&a.last_seen_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(events)
    }

    async fn commit_rule_outcome(
        &mut self,
        rule: RiskRule,
        candidates: Vec<RiskCandidate>,
        now: DateTime<Utc>,
    ) -> Result<RuleCommit> {
        let mut inner = self.lock().await;
        inner.commit_rule(rule, candidates, now)
    }

    async fn put_blueprint(&mut self, blueprint: DependencyBlueprint) -> Result<()> {
        let mut inner = self.lock().await;
        inner.blueprints.insert(blueprint.id.clone(), blueprint);
        Ok(())
    }

    async fn blueprint_for(
        &self,
        structure_type: Option<&str>,
    ) -> Result<Option<DependencyBlueprint>> {
        let inner = self.lock().await;
        let active = || inner.blueprints.values().filter(|b| b.active);

        if let Some(hint) = structure_type {
            if let Some(exact) = active().find(|b| b.structure_type.as_deref() == Some(hint)) {
                return Ok(Some(exact.clone()));
            }
        }
        Ok(active().find(|b| b.structure_type.is_none()).cloned())
    }

    async fn project_ids(&self) -> Result<Vec<ProjectId>> {
        let inner = self.lock().await;
        let mut ids: Vec<ProjectId> = inner
            .units
            .values()
            .filter(|u| u.is_live())
            .map(|u| u.project_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let inner = self.lock().await;

        let mut work_units: Vec<WorkUnit> = inner.units.values().cloned().collect();
        work_units.sort_by(|a, b| a.id.cmp(&b.id));

        let mut dependencies: Vec<Dependency> = inner.dependencies.values().cloned().collect();
        dependencies.sort_by(|a, b| a.id.cmp(&b.id));

        let mut capacities: Vec<ResourceCapacity> = inner.capacities.values().cloned().collect();
        capacities.sort_by(|a, b| a.id.cmp(&b.id));

        let mut risk_events: Vec<RiskEvent> = inner.risks.values().cloned().collect();
        risk_events.sort_by(|a, b| a.id.cmp(&b.id));

        let mut blueprints: Vec<DependencyBlueprint> =
            inner.blueprints.values().cloned().collect();
        blueprints.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Snapshot {
            work_units,
            dependencies,
            capacities,
            risk_events,
            blueprints,
        })
    }
}
