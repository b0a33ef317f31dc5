//! Orchestrator lifecycle state machine.
//!
//! # States
//! ```text
//! NotStarted → Running → ShuttingDown → Stopped
//! ```
//!
//! # Design Decisions
//! - Transitions are one-directional; no state is re-entered
//! - Registration is only valid in `NotStarted`
//! - Observers follow transitions through a watch channel

use tokio::sync::watch;

/// Lifecycle state of an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    NotStarted,
    Running,
    ShuttingDown,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::NotStarted => "not started",
            LifecycleState::Running => "running",
            LifecycleState::ShuttingDown => "shutting down",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner of the current state; publishes every transition.
pub(crate) struct StateCell {
    tx: watch::Sender<LifecycleState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::NotStarted);
        Self { tx }
    }

    pub(crate) fn get(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move forward to `next`. Returns false if that would go backwards or stay put.
    pub(crate) fn advance(&self, next: LifecycleState) -> bool {
        let advanced = self.tx.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
        if advanced {
            tracing::debug!(state = %next, "Lifecycle state changed");
        }
        advanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_one_directional() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), LifecycleState::NotStarted);

        assert!(cell.advance(LifecycleState::Running));
        assert!(!cell.advance(LifecycleState::Running));
        assert!(!cell.advance(LifecycleState::NotStarted));
        assert!(cell.advance(LifecycleState::ShuttingDown));
        assert!(cell.advance(LifecycleState::Stopped));
        assert!(!cell.advance(LifecycleState::ShuttingDown));
        assert_eq!(cell.get(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();

        cell.advance(LifecycleState::Running);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LifecycleState::Running);
    }
}
