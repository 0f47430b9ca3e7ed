//! Engine configuration.
//!
//! Rule thresholds ship with working defaults and can be overridden from a
//! YAML file via the CLI `--config` flag. Unknown keys are rejected so a
//! typoed threshold never silently falls back to the default.

use crate::capacity::CapacityBands;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Thresholds driving the early warning rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Fraction of planned duration a not-started unit may burn before the
    /// late-start rule fires.
    pub late_start_threshold: f64,

    /// Utilization at or above this is a high-severity overload.
    pub capacity_high_utilization: f64,

    /// Utilization at or above this is a critical overload.
    pub capacity_critical_utilization: f64,

    /// Days of slip a critical-path unit may accumulate before the
    /// critical-path rule fires.
    pub critical_path_slip_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            late_start_threshold: 0.4,
            capacity_high_utilization: 0.85,
            capacity_critical_utilization: 1.0,
            critical_path_slip_days: 2,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, parsed, or contains
    /// out-of-range thresholds.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// The capacity bands implied by the utilization thresholds.
    pub fn capacity_bands(&self) -> CapacityBands {
        CapacityBands {
            high: self.capacity_high_utilization,
            critical: self.capacity_critical_utilization,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.late_start_threshold) {
            return Err(Error::Config(format!(
                "late_start_threshold must be within 0..=1, got {}",
                self.late_start_threshold
            )));
        }
        if self.capacity_high_utilization <= 0.0
            || self.capacity_critical_utilization < self.capacity_high_utilization
        {
            return Err(Error::Config(format!(
                "capacity bands must satisfy 0 < high <= critical, got high={} critical={}",
                self.capacity_high_utilization, self.capacity_critical_utilization
            )));
        }
        if self.critical_path_slip_days < 0 {
            return Err(Error::Config(format!(
                "critical_path_slip_days must be non-negative, got {}",
                self.critical_path_slip_days
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.late_start_threshold - 0.4).abs() < 1e-9);
        assert_eq!(config.critical_path_slip_days, 2);
    }

    #[test]
    fn partial_yaml_overrides_keep_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "late_start_threshold: 0.5").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert!((config.late_start_threshold - 0.5).abs() < 1e-9);
        assert!((config.capacity_high_utilization - 0.85).abs() < 1e-9);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "late_start_treshold: 0.5").unwrap();

        assert!(EngineConfig::load(file.path()).is_err());
    }

    #[test]
    fn inverted_bands_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "capacity_high_utilization: 1.2").unwrap();
        writeln!(file, "capacity_critical_utilization: 0.9").unwrap();

        assert!(EngineConfig::load(file.path()).is_err());
    }
}
