//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect name collisions between units
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: OrchestratorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ObservabilityConfig, OrchestratorConfig, ServicesConfig};
use crate::services::store::STORE_HOOK_NAME;

/// Maximum shutdown timeout: 300 seconds (5 minutes).
const MAX_SHUTDOWN_TIMEOUT_MS: u64 = 300_000;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than 0")]
    Zero { field: &'static str },

    #[error("lifecycle.shutdown_timeout_ms must be at most {max} (got {actual})")]
    ShutdownTimeoutTooLarge { max: u64, actual: u64 },

    #[error("unknown log level '{0}'")]
    LogLevel(String),

    #[error("{field} '{value}' is not a valid socket address")]
    Address { field: &'static str, value: String },

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("component label '{0}' is reserved")]
    ReservedName(String),
}

/// Validate the entire configuration, collecting every error.
pub fn validate_config(config: &OrchestratorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let lifecycle = &config.lifecycle;
    if lifecycle.shutdown_timeout_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "lifecycle.shutdown_timeout_ms",
        });
    } else if lifecycle.shutdown_timeout_ms > MAX_SHUTDOWN_TIMEOUT_MS {
        errors.push(ValidationError::ShutdownTimeoutTooLarge {
            max: MAX_SHUTDOWN_TIMEOUT_MS,
            actual: lifecycle.shutdown_timeout_ms,
        });
    }
    if lifecycle.registration_timeout_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "lifecycle.registration_timeout_ms",
        });
    }
    if lifecycle.run_for_secs == Some(0) {
        errors.push(ValidationError::Zero {
            field: "lifecycle.run_for_secs",
        });
    }

    validate_observability(&config.observability, &mut errors);
    validate_services(&config.services, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_observability(config: &ObservabilityConfig, errors: &mut Vec<ValidationError>) {
    if !LOG_LEVELS.contains(&config.log_level.to_lowercase().as_str()) {
        errors.push(ValidationError::LogLevel(config.log_level.clone()));
    }
    if config.metrics_enabled && config.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field: "observability.metrics_address",
            value: config.metrics_address.clone(),
        });
    }
}

fn validate_services(config: &ServicesConfig, errors: &mut Vec<ValidationError>) {
    let mut names = HashSet::new();
    for server in &config.servers {
        if !names.insert(server.name.as_str()) {
            errors.push(ValidationError::DuplicateName {
                kind: "server",
                name: server.name.clone(),
            });
        }
        if server.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::Address {
                field: "services.servers.bind_address",
                value: server.bind_address.clone(),
            });
        }
    }

    let mut labels = HashSet::new();
    for component in &config.components {
        if component.label == STORE_HOOK_NAME {
            errors.push(ValidationError::ReservedName(component.label.clone()));
        } else if !labels.insert(component.label.as_str()) {
            errors.push(ValidationError::DuplicateName {
                kind: "component",
                name: component.label.clone(),
            });
        }
    }
}
