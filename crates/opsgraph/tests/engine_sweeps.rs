//! Integration tests for the early warning engine and the control facade.
//!
//! These tests drive full sweeps through [`OpsControl`] against the
//! in-memory backend and verify the detect / touch / resolve lifecycle of
//! risk events, plus the delay-impact and at-risk queries.

use chrono::{Duration, NaiveDate, Utc};
use opsgraph::app::{AtRiskReason, OpsControl};
use opsgraph::config::EngineConfig;
use opsgraph::domain::{
    CapacityUnit, DependencyKind, NewCapacity, NewWorkUnit, ProjectId, ResourceId, ResourceKind,
    RiskEventFilter, RiskRule, RiskSubject, Severity, SourceRef, WorkUnitKind, WorkUnitStatus,
    WorkUnitUpdate,
};
use opsgraph::storage::in_memory::new_in_memory_store;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn days(n: i64) -> Duration {
    Duration::days(n)
}

fn control() -> OpsControl {
    OpsControl::new(new_in_memory_store(), EngineConfig::default())
}

fn unit(
    source_id: &str,
    kind: WorkUnitKind,
    start: NaiveDate,
    end: NaiveDate,
    status: WorkUnitStatus,
) -> NewWorkUnit {
    NewWorkUnit {
        project_id: ProjectId::from("p1"),
        kind,
        source_ref: SourceRef {
            entity_kind: "task".to_string(),
            entity_id: source_id.to_string(),
        },
        planned_start: start,
        planned_end: end,
        actual_start: None,
        actual_end: None,
        status: Some(status),
        owner_resource_id: None,
        unit_cost: 8.0,
        structure_hint: None,
    }
}

fn rule_filter(rule: RiskRule) -> RiskEventFilter {
    RiskEventFilter {
        rule: Some(rule),
        ..RiskEventFilter::default()
    }
}

// ========== Late start lifecycle ==========

#[tokio::test]
async fn late_start_is_detected_touched_and_resolved() {
    let mut control = control();

    // 10 day plan, 5 days elapsed without starting: past the 40% threshold
    let late = control
        .create_or_update_work_unit(unit(
            "t-late",
            WorkUnitKind::Design,
            today() - days(5),
            today() + days(5),
            WorkUnitStatus::NotStarted,
        ))
        .await
        .unwrap();

    // First sweep detects
    let first = control.run_sweep().await.unwrap();
    assert!(!first.skipped);
    assert_eq!(first.created, 1);
    assert_eq!(first.resolved, 0);

    let events = control
        .list_active_risk_events(&rule_filter(RiskRule::LateStart))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::High);
    assert_eq!(events[0].subject, RiskSubject::WorkUnit(late.id.clone()));
    let first_detected_at = events[0].detected_at;

    // Second sweep re-detects the same incident: touch, not duplicate
    let second = control.run_sweep().await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 1);
    assert_eq!(second.resolved, 0);

    let events = control
        .list_active_risk_events(&rule_filter(RiskRule::LateStart))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].detected_at, first_detected_at);
    assert!(events[0].last_seen_at >= first_detected_at);

    // The unit starts: the condition stops holding and the event resolves
    control
        .update_work_unit(
            &late.id,
            WorkUnitUpdate {
                status: Some(WorkUnitStatus::InProgress),
                ..WorkUnitUpdate::default()
            },
        )
        .await
        .unwrap();

    let third = control.run_sweep().await.unwrap();
    assert_eq!(third.created, 0);
    assert_eq!(third.resolved, 1);

    let events = control
        .list_active_risk_events(&RiskEventFilter::default())
        .await
        .unwrap();
    assert!(events.is_empty());
}

// ========== Dependency cascade ==========

#[tokio::test]
async fn blocked_predecessor_raises_cascade_until_it_completes() {
    let mut control = control();

    // Predecessor 10 days overdue and blocked
    let pred = control
        .create_or_update_work_unit(unit(
            "t-pred",
            WorkUnitKind::Procurement,
            today() - days(20),
            today() - days(10),
            WorkUnitStatus::Blocked,
        ))
        .await
        .unwrap();
    // Successor already running, one day of slack behind the predecessor
    let succ = control
        .create_or_update_work_unit(unit(
            "t-succ",
            WorkUnitKind::Production,
            today() - days(9),
            today() + days(10),
            WorkUnitStatus::InProgress,
        ))
        .await
        .unwrap();
    control
        .add_dependency(&pred.id, &succ.id, DependencyKind::FinishToStart, 0)
        .await
        .unwrap();

    control.run_sweep().await.unwrap();

    // 10 days of slip minus 1 day of slack: 9 unabsorbed days
    let events = control
        .list_active_risk_events(&rule_filter(RiskRule::DependencyCascade))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::High);
    assert_eq!(events[0].subject, RiskSubject::WorkUnit(succ.id.clone()));

    // Predecessor finishes on its planned date after all: no slip left
    control
        .update_work_unit(
            &pred.id,
            WorkUnitUpdate {
                status: Some(WorkUnitStatus::Completed),
                actual_end: Some(today() - days(10)),
                ..WorkUnitUpdate::default()
            },
        )
        .await
        .unwrap();

    let outcome = control.run_sweep().await.unwrap();
    assert!(outcome.resolved >= 1);

    let events = control
        .list_active_risk_events(&rule_filter(RiskRule::DependencyCascade))
        .await
        .unwrap();
    assert!(events.is_empty());
}

// ========== Capacity overload ==========

#[tokio::test]
async fn capacity_overload_targets_the_resource_and_clears_when_supply_grows() {
    let mut control = control();
    let team = ResourceId::from("team-a");

    control
        .create_or_update_work_unit(NewWorkUnit {
            owner_resource_id: Some(team.clone()),
            unit_cost: 95.0,
            ..unit(
                "t-heavy",
                WorkUnitKind::Production,
                today(),
                today() + days(9),
                WorkUnitStatus::InProgress,
            )
        })
        .await
        .unwrap();

    let window = |value: f64| NewCapacity {
        resource_id: team.clone(),
        resource_kind: ResourceKind::Team,
        unit: CapacityUnit::Hours,
        period_start: today(),
        period_end: today() + days(9),
        capacity_value: value,
    };
    control.record_capacity(window(100.0)).await.unwrap();

    control.run_sweep().await.unwrap();

    // 95 load against 100 supply: 95% utilization, high band
    let events = control
        .list_active_risk_events(&rule_filter(RiskRule::CapacityOverload))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::High);
    assert_eq!(events[0].subject, RiskSubject::Resource(team.clone()));

    // More supply recorded for the same window: condition stops holding
    control.record_capacity(window(200.0)).await.unwrap();

    let outcome = control.run_sweep().await.unwrap();
    assert_eq!(outcome.resolved, 1);

    let events = control
        .list_active_risk_events(&rule_filter(RiskRule::CapacityOverload))
        .await
        .unwrap();
    assert!(events.is_empty());
}

// ========== Delay impact query ==========

#[tokio::test]
async fn delay_impact_reports_unabsorbed_delay_downstream() {
    let mut control = control();

    let a = control
        .create_or_update_work_unit(unit(
            "t-a",
            WorkUnitKind::Design,
            today(),
            today() + days(5),
            WorkUnitStatus::InProgress,
        ))
        .await
        .unwrap();
    // 3 days of slack behind a
    let b = control
        .create_or_update_work_unit(unit(
            "t-b",
            WorkUnitKind::Production,
            today() + days(8),
            today() + days(15),
            WorkUnitStatus::NotStarted,
        ))
        .await
        .unwrap();
    control
        .add_dependency(&a.id, &b.id, DependencyKind::FinishToStart, 0)
        .await
        .unwrap();

    let impacts = control.get_delay_impact(&a.id, 5).await.unwrap();
    assert_eq!(impacts.len(), 1);
    assert_eq!(impacts[0].work_unit_id, b.id);
    assert_eq!(impacts[0].projected_delay_days, 2);
    assert_eq!(impacts[0].new_planned_start, b.planned_start + days(2));
    assert_eq!(impacts[0].new_planned_finish, b.planned_end + days(2));

    // Fully absorbed by slack: nothing moves
    let impacts = control.get_delay_impact(&a.id, 2).await.unwrap();
    assert!(impacts.is_empty());
}

// ========== At-risk query ==========

#[tokio::test]
async fn at_risk_listing_carries_every_applicable_reason() {
    let mut control = control();

    // Blocked and due inside the window: two reasons
    let blocked = control
        .create_or_update_work_unit(unit(
            "t-blocked",
            WorkUnitKind::Qc,
            today() - days(3),
            today() + days(3),
            WorkUnitStatus::Blocked,
        ))
        .await
        .unwrap();
    // Late to start, due far out: one reason
    let late = control
        .create_or_update_work_unit(unit(
            "t-late",
            WorkUnitKind::Design,
            today() - days(2),
            today() + days(30),
            WorkUnitStatus::NotStarted,
        ))
        .await
        .unwrap();
    // Completed units never appear
    control
        .create_or_update_work_unit(unit(
            "t-done",
            WorkUnitKind::Documentation,
            today() - days(10),
            today() + days(2),
            WorkUnitStatus::Completed,
        ))
        .await
        .unwrap();

    let mut at_risk = control.get_at_risk_work_units(7).await.unwrap();
    at_risk.sort_by(|x, y| x.work_unit.id.cmp(&y.work_unit.id));
    assert_eq!(at_risk.len(), 2);

    let blocked_entry = at_risk
        .iter()
        .find(|e| e.work_unit.id == blocked.id)
        .unwrap();
    assert!(blocked_entry.reasons.contains(&AtRiskReason::Blocked));
    assert!(
        blocked_entry
            .reasons
            .contains(&AtRiskReason::ApproachingDeadline)
    );

    let late_entry = at_risk.iter().find(|e| e.work_unit.id == late.id).unwrap();
    assert_eq!(late_entry.reasons, vec![AtRiskReason::LateStart]);
}
