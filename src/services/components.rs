//! Disposable components released by termination hooks.

use std::time::Duration;

use thiserror::Error;

use crate::config::ComponentConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("disposing '{label}' failed: {reason}")]
    Dispose { label: String, reason: String },
}

/// A resource whose release takes time and may fail.
#[derive(Debug, Clone)]
pub struct Component {
    label: String,
    dispose_duration: Duration,
    dispose_error: Option<String>,
}

impl Component {
    pub fn new(config: &ComponentConfig) -> Self {
        Self {
            label: config.label.clone(),
            dispose_duration: Duration::from_millis(config.dispose_ms),
            dispose_error: config.dispose_error.clone(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn dispose(self) -> Result<(), ComponentError> {
        tracing::info!(component = %self.label, duration = ?self.dispose_duration, "Disposing component");
        tokio::time::sleep(self.dispose_duration).await;

        if let Some(reason) = self.dispose_error {
            return Err(ComponentError::Dispose {
                label: self.label,
                reason,
            });
        }

        tracing::info!(component = %self.label, "Component disposed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_dispose_takes_configured_time() {
        let start = tokio::time::Instant::now();
        let component = Component::new(&ComponentConfig::new("slow", 1_000, None));

        component.dispose().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_failure() {
        let component = Component::new(&ComponentConfig::new("broken", 10, Some("disk on fire")));

        let err = component.dispose().await.unwrap_err();
        assert_eq!(err.to_string(), "disposing 'broken' failed: disk on fire");
    }
}
