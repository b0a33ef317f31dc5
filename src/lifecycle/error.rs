//! Error taxonomy for the lifecycle subsystem.

use std::time::Duration;
use thiserror::Error;

use crate::lifecycle::state::LifecycleState;

/// Error type returned by threads, shutdown procedures and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by threads, shutdown procedures and hooks.
pub type UnitResult = Result<(), BoxError>;

/// Which registry a unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Thread,
    Hook,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Thread => "thread",
            UnitKind::Hook => "hook",
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure produced by a unit itself.
#[derive(Debug, Error)]
pub enum UnitError {
    /// The unit returned an error.
    #[error("{0}")]
    Failed(#[source] BoxError),

    /// The unit panicked; the payload is converted to a message.
    #[error("panicked: {0}")]
    Panicked(String),

    /// The unit's task was cancelled before it produced a result.
    #[error("task cancelled before completion")]
    Cancelled,
}

impl UnitError {
    /// Convert a task join failure into a unit error.
    pub(crate) fn from_join(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::from_panic(err.into_panic())
        } else {
            UnitError::Cancelled
        }
    }

    /// Convert a caught panic payload into a unit error.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        UnitError::Panicked(panic_message(payload))
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Errors produced by the orchestrator.
///
/// Registration errors are returned directly to the caller. The remaining
/// variants never fail `run`; they are collected into the shutdown report.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A unit with the same name is already registered.
    #[error("{kind} '{name}' is already registered")]
    DuplicateName { kind: UnitKind, name: String },

    /// The operation is not allowed in the current lifecycle state.
    #[error("cannot {operation} while orchestrator is {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    /// A thread did not supply a shutdown procedure within the startup window.
    #[error("thread '{name}' did not register a shutdown procedure within {timeout:?}")]
    RegistrationTimeout { name: String, timeout: Duration },

    /// A unit did not complete within the shutdown deadline and was abandoned.
    #[error("{kind} '{name}' did not complete within the shutdown deadline ({budget:?})")]
    ShutdownTimeout {
        kind: UnitKind,
        name: String,
        budget: Duration,
    },

    /// A unit failed on its own.
    #[error("{kind} '{name}' failed: {source}")]
    Unit {
        kind: UnitKind,
        name: String,
        #[source]
        source: UnitError,
    },
}

impl LifecycleError {
    /// Short label used for metrics and summaries.
    pub fn outcome(&self) -> &'static str {
        match self {
            LifecycleError::DuplicateName { .. } => "duplicate_name",
            LifecycleError::InvalidState { .. } => "invalid_state",
            LifecycleError::RegistrationTimeout { .. } => "registration_timeout",
            LifecycleError::ShutdownTimeout { .. } => "shutdown_timeout",
            LifecycleError::Unit { .. } => "error",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            LifecycleError::RegistrationTimeout { .. } | LifecycleError::ShutdownTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panic_converted_to_message() {
        let handle = tokio::spawn(async {
            panic!("boom");
        });
        let err = handle.await.unwrap_err();
        match UnitError::from_join(err) {
            UnitError::Panicked(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_aborted_task_is_cancelled() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let err = handle.await.unwrap_err();
        assert!(matches!(UnitError::from_join(err), UnitError::Cancelled));
    }

    #[test]
    fn test_display_includes_unit_name() {
        let err = LifecycleError::Unit {
            kind: UnitKind::Hook,
            name: "component-4".into(),
            source: UnitError::Failed("failed to dispose component-4".into()),
        };
        assert_eq!(
            err.to_string(),
            "hook 'component-4' failed: failed to dispose component-4"
        );
        assert_eq!(err.outcome(), "error");
    }
}
