//! Core in-memory storage data structures.
//!
//! This module contains the inner store structure that holds all data and
//! is wrapped in `Arc<Mutex<>>` for thread safety. Mutations that must stay
//! atomic across several records (rule commits, edge writes) live here as
//! plain synchronous methods so the trait implementation can run them under
//! one lock acquisition.

use crate::domain::{
    BlueprintId, CapacityId, Dependency, DependencyBlueprint, DependencyId, DependencyKind,
    ResourceCapacity, ResourceId, RiskCandidate, RiskEvent, RiskEventId, RiskRule, WorkUnit,
    WorkUnitId,
};
use crate::error::{Error, Result};
use crate::id_generation::IdGenerator;
use crate::storage::RuleCommit;
use chrono::{DateTime, NaiveDate, Utc};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

use super::graph::would_create_cycle;

/// Inner store structure (not thread-safe on its own).
pub(crate) struct StoreInner {
    /// Work units indexed by id, retired ones included.
    pub(super) units: HashMap<WorkUnitId, WorkUnit>,

    /// Upsert index: `(entity_kind, entity_id)` -> unit id.
    pub(super) by_source: HashMap<(String, String), WorkUnitId>,

    /// Cycle-check graph. Nodes are unit ids, edges carry the dependency
    /// kind. Direction: predecessor -> successor.
    pub(super) graph: DiGraph<WorkUnitId, DependencyKind>,

    /// Unit id -> graph node. Every unit in `units` has an entry.
    pub(super) node_map: HashMap<WorkUnitId, NodeIndex>,

    /// Dependency edges indexed by id.
    pub(super) dependencies: HashMap<DependencyId, Dependency>,

    /// Fast duplicate-edge check.
    pub(super) edge_keys: HashSet<(WorkUnitId, WorkUnitId)>,

    /// Capacity windows keyed by `(resource, period_start)`.
    pub(super) capacities: HashMap<(ResourceId, NaiveDate), ResourceCapacity>,

    /// Risk events indexed by id, resolved ones included.
    pub(super) risks: HashMap<RiskEventId, RiskEvent>,

    /// Fingerprint -> open event. At most one open event per fingerprint.
    pub(super) open_by_fingerprint: HashMap<String, RiskEventId>,

    /// Blueprints indexed by id.
    pub(super) blueprints: HashMap<BlueprintId, DependencyBlueprint>,

    unit_ids: IdGenerator,
    dep_ids: IdGenerator,
    cap_ids: IdGenerator,
    risk_ids: IdGenerator,
}

impl StoreInner {
    /// Create a new empty store.
    pub(crate) fn new() -> Self {
        Self {
            units: HashMap::new(),
            by_source: HashMap::new(),
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            dependencies: HashMap::new(),
            edge_keys: HashSet::new(),
            capacities: HashMap::new(),
            risks: HashMap::new(),
            open_by_fingerprint: HashMap::new(),
            blueprints: HashMap::new(),
            unit_ids: IdGenerator::with_prefix("wu"),
            dep_ids: IdGenerator::with_prefix("dep"),
            cap_ids: IdGenerator::with_prefix("cap"),
            risk_ids: IdGenerator::with_prefix("risk"),
        }
    }

    pub(super) fn generate_unit_id(&mut self, seed: &str) -> Result<WorkUnitId> {
        self.unit_ids.set_store_size(self.units.len());
        let id = self
            .unit_ids
            .generate(seed)
            .map_err(|e| Error::Storage(format!("ID generation failed: {}", e)))?;
        Ok(WorkUnitId::new(id))
    }

    pub(super) fn generate_dep_id(&mut self, seed: &str) -> Result<DependencyId> {
        self.dep_ids.set_store_size(self.dependencies.len());
        let id = self
            .dep_ids
            .generate(seed)
            .map_err(|e| Error::Storage(format!("ID generation failed: {}", e)))?;
        Ok(DependencyId::new(id))
    }

    pub(super) fn generate_cap_id(&mut self, seed: &str) -> Result<CapacityId> {
        self.cap_ids.set_store_size(self.capacities.len());
        let id = self
            .cap_ids
            .generate(seed)
            .map_err(|e| Error::Storage(format!("ID generation failed: {}", e)))?;
        Ok(CapacityId::new(id))
    }

    pub(super) fn generate_risk_id(&mut self, seed: &str) -> Result<RiskEventId> {
        self.risk_ids.set_store_size(self.risks.len());
        let id = self
            .risk_ids
            .generate(seed)
            .map_err(|e| Error::Storage(format!("ID generation failed: {}", e)))?;
        Ok(RiskEventId::new(id))
    }

    /// Register a loaded record's id with the right generator so future
    /// generation never collides. Used by snapshot loading.
    pub(super) fn register_loaded_ids(&mut self) {
        for id in self.units.keys() {
            self.unit_ids.register_id(id.as_str().to_string());
        }
        for id in self.dependencies.keys() {
            self.dep_ids.register_id(id.as_str().to_string());
        }
        for cap in self.capacities.values() {
            self.cap_ids.register_id(cap.id.as_str().to_string());
        }
        for id in self.risks.keys() {
            self.risk_ids.register_id(id.as_str().to_string());
        }
    }

    /// Insert a unit record and its graph node. The caller guarantees the
    /// id is fresh.
    pub(super) fn insert_unit(&mut self, unit: WorkUnit) {
        let node = self.graph.add_node(unit.id.clone());
        self.node_map.insert(unit.id.clone(), node);
        self.by_source.insert(
            (
                unit.source_ref.entity_kind.clone(),
                unit.source_ref.entity_id.clone(),
            ),
            unit.id.clone(),
        );
        self.units.insert(unit.id.clone(), unit);
    }

    /// A live (non-retired) unit, or `WorkUnitNotFound`.
    pub(super) fn live_unit(&self, id: &WorkUnitId) -> Result<&WorkUnit> {
        self.units
            .get(id)
            .filter(|u| u.is_live())
            .ok_or_else(|| Error::WorkUnitNotFound(id.clone()))
    }

    /// Add a validated edge. All checks happen before any mutation, so a
    /// rejection leaves the graph untouched.
    pub(super) fn add_edge_checked(
        &mut self,
        from: &WorkUnitId,
        to: &WorkUnitId,
        kind: DependencyKind,
        lag_days: i64,
    ) -> Result<Dependency> {
        let from_project = self.live_unit(from)?.project_id.clone();
        let to_project = self.live_unit(to)?.project_id.clone();
        if from_project != to_project {
            return Err(Error::CrossProjectDependency {
                from: from.clone(),
                to: to.clone(),
            });
        }

        if from == to {
            return Err(Error::CycleDetected {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if self.edge_keys.contains(&(from.clone(), to.clone())) {
            return Err(Error::DuplicateDependency {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if would_create_cycle(&self.graph, &self.node_map, from, to)? {
            return Err(Error::CycleDetected {
                from: from.clone(),
                to: to.clone(),
            });
        }

        let id = self.generate_dep_id(&format!("{}>{}", from, to))?;
        let dependency = Dependency {
            id: id.clone(),
            from: from.clone(),
            to: to.clone(),
            kind,
            lag_days,
        };

        let from_node = self.node_map[from];
        let to_node = self.node_map[to];
        self.graph.add_edge(from_node, to_node, kind);
        self.edge_keys.insert((from.clone(), to.clone()));
        self.dependencies.insert(id, dependency.clone());

        Ok(dependency)
    }

    /// Restore an edge from a snapshot, keeping its recorded id. Same
    /// validation as [`Self::add_edge_checked`] minus the liveness check
    /// (snapshots may legitimately carry edges around retired units).
    pub(super) fn restore_edge(&mut self, dep: Dependency) -> Result<()> {
        if dep.from == dep.to
            || would_create_cycle(&self.graph, &self.node_map, &dep.from, &dep.to)?
        {
            return Err(Error::CycleDetected {
                from: dep.from,
                to: dep.to,
            });
        }
        if self.edge_keys.contains(&(dep.from.clone(), dep.to.clone())) {
            return Err(Error::DuplicateDependency {
                from: dep.from,
                to: dep.to,
            });
        }

        let from_node = self.node_map[&dep.from];
        let to_node = self.node_map[&dep.to];
        self.graph.add_edge(from_node, to_node, dep.kind);
        self.edge_keys.insert((dep.from.clone(), dep.to.clone()));
        self.dependencies.insert(dep.id.clone(), dep);
        Ok(())
    }

    /// Whether any edge references the unit.
    pub(super) fn has_edges(&self, id: &WorkUnitId) -> bool {
        self.dependencies
            .values()
            .any(|d| &d.from == id || &d.to == id)
    }

    /// Remove a unit's graph node, repairing the node map after petgraph's
    /// swap-remove moves the last node into the freed index.
    pub(super) fn remove_node(&mut self, id: &WorkUnitId) {
        if let Some(node) = self.node_map.remove(id) {
            self.graph.remove_node(node);
            if let Some(swapped) = self.graph.node_weight(node) {
                self.node_map.insert(swapped.clone(), node);
            }
        }
    }

    pub(super) fn insert_risk(
        &mut self,
        candidate: RiskCandidate,
        now: DateTime<Utc>,
    ) -> Result<RiskEvent> {
        let id = self.generate_risk_id(&candidate.fingerprint)?;
        let event = RiskEvent {
            id: id.clone(),
            project_id: candidate.project_id,
            subject: candidate.subject,
            rule: candidate.rule,
            severity: candidate.severity,
            fingerprint: candidate.fingerprint.clone(),
            title: candidate.title,
            description: candidate.description,
            detected_at: now,
            last_seen_at: now,
            resolved_at: None,
        };
        self.open_by_fingerprint
            .insert(candidate.fingerprint, id.clone());
        self.risks.insert(id.clone(), event.clone());
        Ok(event)
    }

    fn touch_risk(
        &mut self,
        candidate: &RiskCandidate,
        now: DateTime<Utc>,
    ) -> Option<RiskEvent> {
        let id = self.open_by_fingerprint.get(&candidate.fingerprint)?;
        let event = self.risks.get_mut(id)?;
        event.last_seen_at = now;
        // Severity and description follow the latest observation
        event.severity = candidate.severity;
        event.description = candidate.description.clone();
        Some(event.clone())
    }

    /// Refresh an open event's last-seen time without new candidate data.
    pub(super) fn touch_by_fingerprint(
        &mut self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Option<RiskEvent> {
        let id = self.open_by_fingerprint.get(fingerprint)?;
        let event = self.risks.get_mut(id)?;
        event.last_seen_at = now;
        Some(event.clone())
    }

    pub(super) fn resolve_risk(&mut self, fingerprint: &str, now: DateTime<Utc>) -> Option<RiskEvent> {
        let id = self.open_by_fingerprint.remove(fingerprint)?;
        let event = self.risks.get_mut(&id)?;
        event.resolved_at = Some(now);
        Some(event.clone())
    }

    /// Reconcile one rule's candidates against its open events. This runs
    /// inside a single trait-level lock acquisition, making the per-rule
    /// commit one logical unit.
    pub(super) fn commit_rule(
        &mut self,
        rule: RiskRule,
        candidates: Vec<RiskCandidate>,
        now: DateTime<Utc>,
    ) -> Result<RuleCommit> {
        let mut commit = RuleCommit::default();
        let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());

        for candidate in candidates {
            debug_assert_eq!(candidate.rule, rule);
            seen.insert(candidate.fingerprint.clone());
            if self.touch_risk(&candidate, now).is_some() {
                commit.updated += 1;
            } else {
                self.insert_risk(candidate, now)?;
                commit.created += 1;
            }
        }

        let stale: Vec<String> = self
            .open_by_fingerprint
            .iter()
            .filter(|(fp, id)| {
                !seen.contains(*fp)
                    && self.risks.get(*id).is_some_and(|e| e.rule == rule)
            })
            .map(|(fp, _)| fp.clone())
            .collect();

        for fingerprint in stale {
            if self.resolve_risk(&fingerprint, now).is_some() {
                commit.resolved += 1;
            }
        }

        Ok(commit)
    }
}
