//! CLI value enums and domain type conversions.

use clap::ValueEnum;

use crate::domain::{RiskRule, Severity};

/// Severity filter for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityArg {
    /// Minor schedule noise
    Low,
    /// Worth watching
    Medium,
    /// Needs intervention
    High,
    /// Threatens the project schedule
    Critical,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Low => Severity::Low,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::High => Severity::High,
            SeverityArg::Critical => Severity::Critical,
        }
    }
}

/// Risk rule filter for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskRuleArg {
    /// Not-started unit past its start threshold
    #[value(name = "late-start", alias = "late_start")]
    LateStart,
    /// Unabsorbed delay projected across an edge
    #[value(name = "dependency-cascade", alias = "dependency_cascade")]
    DependencyCascade,
    /// Resource load above its capacity bands
    #[value(name = "capacity-overload", alias = "capacity_overload")]
    CapacityOverload,
    /// Slip on the project's longest chain
    #[value(name = "critical-path-delay", alias = "critical_path_delay")]
    CriticalPathDelay,
}

impl From<RiskRuleArg> for RiskRule {
    fn from(arg: RiskRuleArg) -> Self {
        match arg {
            RiskRuleArg::LateStart => RiskRule::LateStart,
            RiskRuleArg::DependencyCascade => RiskRule::DependencyCascade,
            RiskRuleArg::CapacityOverload => RiskRule::CapacityOverload,
            RiskRuleArg::CriticalPathDelay => RiskRule::CriticalPathDelay,
        }
    }
}
