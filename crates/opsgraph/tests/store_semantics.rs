//! Integration tests for the in-memory storage backend.
//!
//! These tests verify the consistency rules the store promises: idempotent
//! source-keyed upserts, actual-date stamping on status transitions,
//! all-or-nothing edge validation, soft-close versus hard delete, and
//! blueprint selection.

use chrono::NaiveDate;
use opsgraph::domain::{
    BlueprintId, BlueprintStep, CapacityUnit, DependencyBlueprint, DependencyKind, NewCapacity,
    NewWorkUnit, ProjectId, ResourceId, ResourceKind, SourceRef, WorkUnitFilter, WorkUnitId,
    WorkUnitKind, WorkUnitStatus, WorkUnitUpdate,
};
use opsgraph::error::Error;
use opsgraph::storage::OpsStore;
use opsgraph::storage::in_memory::new_in_memory_store;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn new_unit(project: &str, kind: WorkUnitKind, source_id: &str) -> NewWorkUnit {
    NewWorkUnit {
        project_id: ProjectId::from(project),
        kind,
        source_ref: SourceRef {
            entity_kind: "task".to_string(),
            entity_id: source_id.to_string(),
        },
        planned_start: date(2026, 3, 2),
        planned_end: date(2026, 3, 20),
        actual_start: None,
        actual_end: None,
        status: None,
        owner_resource_id: None,
        unit_cost: 8.0,
        structure_hint: None,
    }
}

// ========== Upsert semantics ==========

#[tokio::test]
async fn upsert_creates_then_refreshes_by_source_ref() {
    let mut store = new_in_memory_store();

    let created = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();
    assert!(created.id.as_str().starts_with("wu-"));
    assert_eq!(created.status, WorkUnitStatus::NotStarted);

    // Same source ref, different dates: refreshes in place
    let mut again = new_unit("p1", WorkUnitKind::Design, "t-1");
    again.planned_end = date(2026, 3, 25);
    let updated = store.upsert_work_unit(again).await.unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.planned_end, date(2026, 3, 25));

    let all = store
        .list_work_units(&WorkUnitFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn upsert_revives_a_retired_unit() {
    let mut store = new_in_memory_store();

    let a = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();
    let b = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Production, "t-2"))
        .await
        .unwrap();
    store
        .add_dependency(&a.id, &b.id, DependencyKind::FinishToStart, 0)
        .await
        .unwrap();

    // Referenced by an edge: remove soft-closes
    store.remove_work_unit(&a.id).await.unwrap();
    assert!(store.get_work_unit(&a.id).await.unwrap().is_none());

    let revived = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();
    assert_eq!(revived.id, a.id);
    assert!(revived.retired_at.is_none());
}

// ========== Status transitions ==========

#[tokio::test]
async fn first_in_progress_transition_stamps_actual_start() {
    let mut store = new_in_memory_store();
    let unit = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();
    assert!(unit.actual_start.is_none());

    let started = store
        .update_work_unit(
            &unit.id,
            WorkUnitUpdate {
                status: Some(WorkUnitStatus::InProgress),
                ..WorkUnitUpdate::default()
            },
        )
        .await
        .unwrap();
    assert!(started.actual_start.is_some());
    assert!(started.actual_end.is_none());

    let done = store
        .update_work_unit(
            &unit.id,
            WorkUnitUpdate {
                status: Some(WorkUnitStatus::Completed),
                ..WorkUnitUpdate::default()
            },
        )
        .await
        .unwrap();
    assert!(done.actual_end.is_some());
}

#[tokio::test]
async fn creating_a_unit_already_in_progress_stamps_actual_start() {
    let mut store = new_in_memory_store();
    let mut new = new_unit("p1", WorkUnitKind::Design, "t-1");
    new.status = Some(WorkUnitStatus::InProgress);

    let unit = store.upsert_work_unit(new).await.unwrap();
    assert_eq!(unit.status, WorkUnitStatus::InProgress);
    assert!(unit.actual_start.is_some());
    assert!(unit.actual_end.is_none());
}

#[tokio::test]
async fn explicit_actual_dates_win_over_stamping() {
    let mut store = new_in_memory_store();
    let unit = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();

    let done = store
        .update_work_unit(
            &unit.id,
            WorkUnitUpdate {
                status: Some(WorkUnitStatus::Completed),
                actual_end: Some(date(2026, 3, 18)),
                ..WorkUnitUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(done.actual_end, Some(date(2026, 3, 18)));
}

#[tokio::test]
async fn update_of_missing_unit_fails() {
    let mut store = new_in_memory_store();
    let result = store
        .update_work_unit(&WorkUnitId::from("wu-none"), WorkUnitUpdate::default())
        .await;
    assert!(matches!(result, Err(Error::WorkUnitNotFound(_))));
}

// ========== Dependency validation ==========

#[tokio::test]
async fn cycle_rejection_leaves_graph_unchanged() {
    let mut store = new_in_memory_store();
    let a = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();
    let b = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Production, "t-2"))
        .await
        .unwrap();
    let c = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Erection, "t-3"))
        .await
        .unwrap();

    store
        .add_dependency(&a.id, &b.id, DependencyKind::FinishToStart, 0)
        .await
        .unwrap();
    store
        .add_dependency(&b.id, &c.id, DependencyKind::FinishToStart, 0)
        .await
        .unwrap();

    // c -> a would close a cycle through the transitive path
    let result = store
        .add_dependency(&c.id, &a.id, DependencyKind::FinishToStart, 0)
        .await;
    assert!(matches!(result, Err(Error::CycleDetected { .. })));

    let deps = store.list_dependencies(None).await.unwrap();
    assert_eq!(deps.len(), 2);

    // The rejected attempt must not have poisoned later writes
    let d = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Qc, "t-4"))
        .await
        .unwrap();
    store
        .add_dependency(&c.id, &d.id, DependencyKind::FinishToStart, 0)
        .await
        .unwrap();
}

#[tokio::test]
async fn self_edges_and_duplicates_are_rejected() {
    let mut store = new_in_memory_store();
    let a = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();
    let b = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Production, "t-2"))
        .await
        .unwrap();

    let self_edge = store
        .add_dependency(&a.id, &a.id, DependencyKind::FinishToStart, 0)
        .await;
    assert!(matches!(self_edge, Err(Error::CycleDetected { .. })));

    store
        .add_dependency(&a.id, &b.id, DependencyKind::FinishToStart, 2)
        .await
        .unwrap();
    let duplicate = store
        .add_dependency(&a.id, &b.id, DependencyKind::StartToStart, 0)
        .await;
    assert!(matches!(duplicate, Err(Error::DuplicateDependency { .. })));
}

#[tokio::test]
async fn edges_between_projects_are_rejected() {
    let mut store = new_in_memory_store();
    let a = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();
    let b = store
        .upsert_work_unit(new_unit("p2", WorkUnitKind::Production, "t-2"))
        .await
        .unwrap();

    let result = store
        .add_dependency(&a.id, &b.id, DependencyKind::FinishToStart, 0)
        .await;
    assert!(matches!(result, Err(Error::CrossProjectDependency { .. })));
    assert!(store.list_dependencies(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn dependencies_of_splits_incoming_and_outgoing() {
    let mut store = new_in_memory_store();
    let a = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();
    let b = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Production, "t-2"))
        .await
        .unwrap();
    let c = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Erection, "t-3"))
        .await
        .unwrap();
    store
        .add_dependency(&a.id, &b.id, DependencyKind::FinishToStart, 0)
        .await
        .unwrap();
    store
        .add_dependency(&b.id, &c.id, DependencyKind::FinishToStart, 0)
        .await
        .unwrap();

    let (incoming, outgoing) = store.dependencies_of(&b.id).await.unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].from, a.id);
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].to, c.id);
}

// ========== Removal ==========

#[tokio::test]
async fn unreferenced_unit_is_hard_deleted() {
    let mut store = new_in_memory_store();
    let a = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();

    store.remove_work_unit(&a.id).await.unwrap();

    // Hard delete: invisible even to retired-inclusive listings
    let filter = WorkUnitFilter {
        include_retired: true,
        ..WorkUnitFilter::default()
    };
    assert!(store.list_work_units(&filter).await.unwrap().is_empty());
}

#[tokio::test]
async fn referenced_unit_is_soft_closed() {
    let mut store = new_in_memory_store();
    let a = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();
    let b = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Production, "t-2"))
        .await
        .unwrap();
    store
        .add_dependency(&a.id, &b.id, DependencyKind::FinishToStart, 0)
        .await
        .unwrap();

    store.remove_work_unit(&a.id).await.unwrap();

    // Gone from live listings, edge history intact
    assert!(store.get_work_unit(&a.id).await.unwrap().is_none());
    assert_eq!(store.list_dependencies(None).await.unwrap().len(), 1);

    let filter = WorkUnitFilter {
        include_retired: true,
        ..WorkUnitFilter::default()
    };
    let all = store.list_work_units(&filter).await.unwrap();
    assert_eq!(all.len(), 2);
    let retired = all.iter().find(|u| u.id == a.id).unwrap();
    assert!(retired.retired_at.is_some());
}

#[tokio::test]
async fn retired_unit_is_invisible_to_source_ref_lookup() {
    let mut store = new_in_memory_store();
    let a = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();
    let b = store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Production, "t-2"))
        .await
        .unwrap();
    store
        .add_dependency(&a.id, &b.id, DependencyKind::FinishToStart, 0)
        .await
        .unwrap();
    store.remove_work_unit(&a.id).await.unwrap();

    let by_source = store
        .find_by_source_ref(&SourceRef {
            entity_kind: "task".to_string(),
            entity_id: "t-1".to_string(),
        })
        .await
        .unwrap();
    assert!(by_source.is_none());
}

// ========== Capacity ==========

#[tokio::test]
async fn recording_same_window_overwrites() {
    let mut store = new_in_memory_store();
    let new_cap = |value: f64| NewCapacity {
        resource_id: ResourceId::from("team-a"),
        resource_kind: ResourceKind::Team,
        unit: CapacityUnit::Hours,
        period_start: date(2026, 3, 1),
        period_end: date(2026, 3, 31),
        capacity_value: value,
    };

    store.record_capacity(new_cap(160.0)).await.unwrap();
    store.record_capacity(new_cap(120.0)).await.unwrap();

    let windows = store
        .list_capacities(Some(&ResourceId::from("team-a")))
        .await
        .unwrap();
    assert_eq!(windows.len(), 1);
    assert!((windows[0].capacity_value - 120.0).abs() < f64::EPSILON);
}

// ========== Blueprints ==========

#[tokio::test]
async fn blueprint_lookup_prefers_exact_match_over_default() {
    let mut store = new_in_memory_store();

    let step = BlueprintStep {
        from_kind: WorkUnitKind::Design,
        to_kind: WorkUnitKind::Production,
        dependency_kind: DependencyKind::FinishToStart,
        lag_days: 0,
    };
    store
        .put_blueprint(DependencyBlueprint {
            id: BlueprintId::from("bp-default"),
            name: "default".to_string(),
            structure_type: None,
            active: true,
            steps: vec![step.clone()],
        })
        .await
        .unwrap();
    store
        .put_blueprint(DependencyBlueprint {
            id: BlueprintId::from("bp-bridge"),
            name: "bridge".to_string(),
            structure_type: Some("bridge".to_string()),
            active: true,
            steps: vec![step.clone()],
        })
        .await
        .unwrap();
    store
        .put_blueprint(DependencyBlueprint {
            id: BlueprintId::from("bp-off"),
            name: "tower (inactive)".to_string(),
            structure_type: Some("tower".to_string()),
            active: false,
            steps: vec![step],
        })
        .await
        .unwrap();

    let exact = store.blueprint_for(Some("bridge")).await.unwrap().unwrap();
    assert_eq!(exact.id, BlueprintId::from("bp-bridge"));

    // No exact match: fall through to the default
    let fallback = store.blueprint_for(Some("plant")).await.unwrap().unwrap();
    assert_eq!(fallback.id, BlueprintId::from("bp-default"));

    // Inactive blueprints never match, even exactly
    let inactive = store.blueprint_for(Some("tower")).await.unwrap().unwrap();
    assert_eq!(inactive.id, BlueprintId::from("bp-default"));
}

// ========== Projects ==========

#[tokio::test]
async fn project_ids_are_distinct_and_sorted() {
    let mut store = new_in_memory_store();
    store
        .upsert_work_unit(new_unit("p2", WorkUnitKind::Design, "t-1"))
        .await
        .unwrap();
    store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Design, "t-2"))
        .await
        .unwrap();
    store
        .upsert_work_unit(new_unit("p1", WorkUnitKind::Production, "t-3"))
        .await
        .unwrap();

    let projects = store.project_ids().await.unwrap();
    assert_eq!(projects, vec![ProjectId::from("p1"), ProjectId::from("p2")]);
}
