//! The early warning rules.
//!
//! Each rule is a pure function from observed state to a list of
//! [`RiskCandidate`]s; the engine reconciles candidates against open events
//! afterwards. Rules must be deterministic in their inputs: `today` is
//! passed in, never read from the clock, which is what makes a sweep over
//! unchanged data idempotent.

use crate::capacity::{CapacityBands, compute_load, utilization};
use crate::config::EngineConfig;
use crate::domain::{
    ResourceCapacity, RiskCandidate, RiskRule, RiskSubject, Severity, WorkUnit, WorkUnitStatus,
};
use crate::graph::{GraphSnapshot, observed_finish_slip};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};

/// Length of the hex fingerprint kept on a risk event.
const FINGERPRINT_LEN: usize = 32;

/// Deterministic incident key: SHA-256 over the rule name and its
/// identifying parts, hex-encoded and truncated.
pub fn fingerprint(rule: RiskRule, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rule.as_str().as_bytes());
    for part in parts {
        hasher.update(b":");
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// A not-started unit that has burned too much of its planned duration.
///
/// Fires once `today - planned_start` reaches the configured fraction of
/// the planned duration. Zero-duration plans fire the day after their
/// planned start.
pub fn late_start(
    snapshot: &GraphSnapshot,
    config: &EngineConfig,
    today: NaiveDate,
) -> Vec<RiskCandidate> {
    snapshot
        .units()
        .iter()
        .filter(|u| u.status == WorkUnitStatus::NotStarted)
        .filter_map(|unit| {
            let elapsed = (today - unit.planned_start).num_days();
            if elapsed <= 0 {
                return None;
            }
            let duration = unit.planned_duration_days();
            let threshold = (duration as f64 * config.late_start_threshold).ceil() as i64;
            if elapsed < threshold.max(1) {
                return None;
            }
            Some(RiskCandidate {
                project_id: unit.project_id.clone(),
                subject: RiskSubject::WorkUnit(unit.id.clone()),
                rule: RiskRule::LateStart,
                severity: Severity::High,
                fingerprint: fingerprint(RiskRule::LateStart, &[unit.id.as_str()]),
                title: format!("Work unit {} has not started", unit.source_ref),
                description: format!(
                    "{} days elapsed of a {}-day plan without a start (threshold {:.0}%)",
                    elapsed,
                    duration,
                    config.late_start_threshold * 100.0
                ),
            })
        })
        .collect()
}

fn cascade_severity(delay_days: i64) -> Severity {
    match delay_days {
        ..3 => Severity::Low,
        3..7 => Severity::Medium,
        7..14 => Severity::High,
        _ => Severity::Critical,
    }
}

/// A troubled predecessor projecting unabsorbed delay onto a direct
/// successor.
///
/// Only blocked or delayed predecessors are projected; their observed
/// finish slip runs through each outgoing edge's slack, and whatever
/// survives becomes a candidate on the successor. One candidate per
/// `(successor, predecessor)` edge, so parallel troubled predecessors
/// produce separately tracked incidents.
pub fn dependency_cascade(snapshot: &GraphSnapshot, today: NaiveDate) -> Vec<RiskCandidate> {
    let mut candidates = Vec::new();

    for pred in snapshot.units() {
        if !pred.status.is_troubled() {
            continue;
        }
        let slip = observed_finish_slip(pred, today);
        if slip <= 0 {
            continue;
        }

        for edge in snapshot.outgoing(&pred.id) {
            let Some(successor) = snapshot.unit(&edge.to) else {
                continue;
            };
            let slack = snapshot.edge_slack(edge).unwrap_or(0).max(0);
            let cascaded = slip - slack;
            if cascaded <= 0 {
                continue;
            }

            candidates.push(RiskCandidate {
                project_id: successor.project_id.clone(),
                subject: RiskSubject::WorkUnit(successor.id.clone()),
                rule: RiskRule::DependencyCascade,
                severity: cascade_severity(cascaded),
                fingerprint: fingerprint(
                    RiskRule::DependencyCascade,
                    &[successor.id.as_str(), pred.id.as_str()],
                ),
                title: format!(
                    "Delay cascading onto {} from {}",
                    successor.source_ref, pred.source_ref
                ),
                description: format!(
                    "Predecessor {} is {} days behind; {} days survive the edge slack of {}",
                    pred.id, slip, cascaded, slack
                ),
            });
        }
    }

    candidates
}

/// A resource whose prorated load exceeds a recorded capacity window.
///
/// Each capacity window is assessed independently. The emitted event is
/// attributed to the project contributing the most load in the window.
pub fn capacity_overload(
    units: &[WorkUnit],
    capacities: &[ResourceCapacity],
    bands: &CapacityBands,
) -> Vec<RiskCandidate> {
    capacities
        .iter()
        .filter_map(|window| {
            let load = compute_load(
                units,
                &window.resource_id,
                window.period_start,
                window.period_end,
            );
            let ratio = utilization(load.total, window.capacity_value)?;
            let severity = bands.classify(ratio)?;
            let project_id = load.dominant_project()?.clone();

            Some(RiskCandidate {
                project_id,
                subject: RiskSubject::Resource(window.resource_id.clone()),
                rule: RiskRule::CapacityOverload,
                severity,
                fingerprint: fingerprint(
                    RiskRule::CapacityOverload,
                    &[
                        window.resource_id.as_str(),
                        &window.period_start.to_string(),
                    ],
                ),
                title: format!(
                    "Resource {} overloaded {} to {}",
                    window.resource_id, window.period_start, window.period_end
                ),
                description: format!(
                    "Load {:.1} against capacity {:.1} ({:.0}% utilization)",
                    load.total,
                    window.capacity_value,
                    ratio * 100.0
                ),
            })
        })
        .collect()
}

/// A unit on the project's longest planned chain that has slipped.
///
/// Only units on the critical path are eligible; the same slip off the
/// chain never fires this rule. Severity is always critical, since slippage
/// here moves the project finish date by definition.
pub fn critical_path_delay(
    snapshot: &GraphSnapshot,
    config: &EngineConfig,
    today: NaiveDate,
) -> Vec<RiskCandidate> {
    snapshot
        .critical_path()
        .into_iter()
        .filter_map(|id| {
            let unit = snapshot.unit(&id)?;
            let slip = observed_finish_slip(unit, today);
            if slip <= config.critical_path_slip_days {
                return None;
            }
            Some(RiskCandidate {
                project_id: unit.project_id.clone(),
                subject: RiskSubject::WorkUnit(unit.id.clone()),
                rule: RiskRule::CriticalPathDelay,
                severity: Severity::Critical,
                fingerprint: fingerprint(RiskRule::CriticalPathDelay, &[unit.id.as_str()]),
                title: format!("Critical path unit {} slipping", unit.source_ref),
                description: format!(
                    "{} days behind plan on the project's longest chain (tolerance {} days)",
                    slip, config.critical_path_slip_days
                ),
            })
        })
        .collect()
}
