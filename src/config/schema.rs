//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! orchestrator and the workload it hosts. All types derive Serde traits for
//! deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lifecycle::signals::TerminationSignal;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Shutdown timing and termination triggers.
    pub lifecycle: LifecycleConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Workload hosted by the binary.
    pub services: ServicesConfig,
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Global shutdown deadline in milliseconds.
    pub shutdown_timeout_ms: u64,

    /// Time a thread has after launch to supply its shutdown procedure.
    pub registration_timeout_ms: u64,

    /// Minimum time a hook gets when the global deadline has already passed.
    pub hook_min_grace_ms: u64,

    /// OS signals that trigger shutdown.
    pub signals: Vec<TerminationSignal>,

    /// Shut down on our own after this many seconds.
    pub run_for_secs: Option<u64>,
}

impl LifecycleConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }

    pub fn hook_min_grace(&self) -> Duration {
        Duration::from_millis(self.hook_min_grace_ms)
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_secs.map(Duration::from_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: 10_000,
            registration_timeout_ms: 5_000,
            hook_min_grace_ms: 100,
            signals: TerminationSignal::ALL.to_vec(),
            run_for_secs: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format (development).
    #[default]
    Pretty,
    /// JSON format for machine parsing (production).
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Workload hosted by the binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// HTTP servers, each run as its own thread.
    pub servers: Vec<ServerConfig>,

    /// How long a `?slow=true` request takes, in milliseconds.
    pub slow_request_ms: u64,

    /// Components released by termination hooks.
    pub components: Vec<ComponentConfig>,
}

impl ServicesConfig {
    pub fn slow_request(&self) -> Duration {
        Duration::from_millis(self.slow_request_ms)
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            servers: vec![
                ServerConfig {
                    name: "http.server(1)".to_string(),
                    bind_address: "0.0.0.0:8080".to_string(),
                },
                ServerConfig {
                    name: "http.server(2)".to_string(),
                    bind_address: "0.0.0.0:8081".to_string(),
                },
            ],
            slow_request_ms: 7_000,
            components: vec![
                ComponentConfig::new("component-1", 0, None),
                ComponentConfig::new("component-2", 1_000, None),
                ComponentConfig::new("component-3", 5_000, None),
                ComponentConfig::new("component-4", 3_000, Some("failed to dispose component-4")),
            ],
        }
    }
}

/// HTTP server thread configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Thread name used for logging and the shutdown report.
    pub name: String,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

/// Disposable component configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComponentConfig {
    /// Hook name.
    pub label: String,

    /// How long disposal takes, in milliseconds.
    #[serde(default)]
    pub dispose_ms: u64,

    /// If set, disposal fails with this message.
    #[serde(default)]
    pub dispose_error: Option<String>,
}

impl ComponentConfig {
    pub fn new(label: &str, dispose_ms: u64, dispose_error: Option<&str>) -> Self {
        Self {
            label: label.to_string(),
            dispose_ms,
            dispose_error: dispose_error.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            [lifecycle]
            shutdown_timeout_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(config.lifecycle.shutdown_timeout(), Duration::from_millis(1500));
        assert_eq!(config.lifecycle.registration_timeout(), Duration::from_secs(5));
        assert_eq!(config.lifecycle.signals.len(), 4);
        assert_eq!(config.services.servers.len(), 2);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_components_and_servers_parse() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            [observability]
            log_format = "json"

            [services]
            slow_request_ms = 250

            [[services.servers]]
            name = "api"
            bind_address = "127.0.0.1:3000"

            [[services.components]]
            label = "cache"
            dispose_ms = 20
            dispose_error = "cache flush failed"
            "#,
        )
        .unwrap();

        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.services.slow_request(), Duration::from_millis(250));
        assert_eq!(config.services.servers[0].name, "api");
        assert_eq!(
            config.services.components[0].dispose_error.as_deref(),
            Some("cache flush failed")
        );
    }
}
