//! Aggregated shutdown outcome.

use std::time::Duration;

use crate::lifecycle::error::{LifecycleError, UnitKind};
use crate::lifecycle::signals::ShutdownTrigger;
use crate::lifecycle::threads::RegistrationStatus;

/// Outcome of a single thread or hook.
#[derive(Debug)]
pub struct UnitReport {
    pub name: String,
    pub kind: UnitKind,
    /// `None` when the unit stopped cleanly.
    pub error: Option<LifecycleError>,
    /// How the thread supplied its shutdown procedure. Always `None` for hooks.
    pub registration: Option<RegistrationStatus>,
}

impl UnitReport {
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }

    fn outcome(&self) -> &'static str {
        self.error.as_ref().map_or("ok", LifecycleError::outcome)
    }
}

/// Everything the orchestrator observed while shutting down.
///
/// Threads come first in registration order, then hooks in registration
/// order. Callers decide what a non-clean entry means for them.
#[derive(Debug)]
pub struct ShutdownReport {
    pub trigger: ShutdownTrigger,
    pub units: Vec<UnitReport>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    pub fn get(&self, name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|unit| unit.name == name)
    }

    pub fn threads(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|unit| unit.kind == UnitKind::Thread)
    }

    pub fn hooks(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|unit| unit.kind == UnitKind::Hook)
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|unit| !unit.is_clean())
    }

    /// True when every thread and hook stopped without error.
    pub fn is_clean(&self) -> bool {
        self.units.iter().all(UnitReport::is_clean)
    }

    /// Emit one log line per unit plus a summary.
    pub fn log_summary(&self) {
        for unit in &self.units {
            match &unit.error {
                None => tracing::info!(
                    unit = %unit.name,
                    kind = %unit.kind,
                    registration = ?unit.registration,
                    "Unit stopped cleanly"
                ),
                Some(err) => tracing::warn!(
                    unit = %unit.name,
                    kind = %unit.kind,
                    outcome = unit.outcome(),
                    error = %err,
                    "Unit did not stop cleanly"
                ),
            }
        }
        tracing::info!(
            trigger = %self.trigger,
            units = self.units.len(),
            failures = self.failures().count(),
            elapsed = ?self.elapsed,
            "Shutdown complete"
        );
    }

    pub(crate) fn record_metrics(&self) {
        for unit in &self.units {
            crate::observability::metrics::record_unit_outcome(unit.kind.as_str(), unit.outcome());
        }
        crate::observability::metrics::record_shutdown_duration(self.elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::error::UnitError;

    fn sample() -> ShutdownReport {
        ShutdownReport {
            trigger: ShutdownTrigger::Stop,
            elapsed: Duration::from_millis(250),
            units: vec![
                UnitReport {
                    name: "http.server(1)".into(),
                    kind: UnitKind::Thread,
                    error: None,
                    registration: Some(RegistrationStatus::Registered),
                },
                UnitReport {
                    name: "component-4".into(),
                    kind: UnitKind::Hook,
                    error: Some(LifecycleError::Unit {
                        kind: UnitKind::Hook,
                        name: "component-4".into(),
                        source: UnitError::Failed("failed to dispose component-4".into()),
                    }),
                    registration: None,
                },
                UnitReport {
                    name: "redis client".into(),
                    kind: UnitKind::Hook,
                    error: None,
                    registration: None,
                },
            ],
        }
    }

    #[test]
    fn test_accessors_partition_units() {
        let report = sample();
        assert_eq!(report.threads().count(), 1);
        assert_eq!(report.hooks().count(), 2);

        let failures: Vec<_> = report.failures().map(|u| u.name.as_str()).collect();
        assert_eq!(failures, ["component-4"]);
        assert!(report.get("redis client").unwrap().is_clean());
        assert!(report.get("missing").is_none());
    }
}
