//! Termination hook registry.
//!
//! # Responsibilities
//! - Store named one-shot cleanup actions
//! - Reject duplicate names
//! - Hand hooks to the shutdown walk in registration order
//!
//! # Design Decisions
//! - No internal locking: the orchestrator only mutates the registry
//!   before start and walks it once during shutdown

use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::lifecycle::deadline::Deadline;
use crate::lifecycle::error::{LifecycleError, UnitKind, UnitResult};

type HookAction = Box<dyn FnOnce(Deadline) -> BoxFuture<'static, UnitResult> + Send>;

/// A named cleanup action invoked exactly once during shutdown.
pub struct Hook {
    name: String,
    action: HookAction,
}

impl Hook {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consume the hook and build the future that performs its cleanup.
    pub(crate) fn invoke(self, deadline: Deadline) -> BoxFuture<'static, UnitResult> {
        (self.action)(deadline)
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook").field("name", &self.name).finish()
    }
}

/// Ordered collection of hooks.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: Vec<Hook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Fails without side effects if the name is taken.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, action: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(Deadline) -> Fut + Send + 'static,
        Fut: Future<Output = UnitResult> + Send + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return Err(LifecycleError::DuplicateName {
                kind: UnitKind::Hook,
                name,
            });
        }

        tracing::debug!(hook = %name, "Termination hook registered");
        self.hooks.push(Hook {
            name,
            action: Box::new(move |deadline| action(deadline).boxed()),
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.iter().any(|hook| hook.name == name)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Visit hooks in registration order.
    pub fn for_each(&self, mut visit: impl FnMut(&Hook)) {
        self.hooks.iter().for_each(|hook| visit(hook));
    }
}

impl IntoIterator for HookRegistry {
    type Item = Hook;
    type IntoIter = std::vec::IntoIter<Hook>;

    fn into_iter(self) -> Self::IntoIter {
        self.hooks.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_duplicate_name_rejected_without_effect() {
        let mut registry = HookRegistry::new();
        registry.register("redis client", |_| async { Ok(()) }).unwrap();

        let err = registry
            .register("redis client", |_| async { Err("second".into()) })
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::DuplicateName { kind: UnitKind::Hook, ref name } if name == "redis client"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_for_each_visits_in_registration_order() {
        let mut registry = HookRegistry::new();
        for label in ["component-1", "component-2", "component-3"] {
            registry.register(label, |_| async { Ok(()) }).unwrap();
        }

        let mut seen = Vec::new();
        registry.for_each(|hook| seen.push(hook.name().to_string()));
        assert_eq!(seen, ["component-1", "component-2", "component-3"]);
    }

    #[tokio::test]
    async fn test_invoke_passes_deadline() {
        let mut registry = HookRegistry::new();
        registry
            .register("check", |deadline: Deadline| async move {
                if deadline.is_expired() {
                    Err("deadline already expired".into())
                } else {
                    Ok(())
                }
            })
            .unwrap();

        let hook = registry.into_iter().next().unwrap();
        let result = hook.invoke(Deadline::after(Duration::from_secs(1))).await;
        assert!(result.is_ok());
    }
}
