//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::OrchestratorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: OrchestratorConfig =
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(
            r#"
            [lifecycle]
            shutdown_timeout_ms = 2000
            signals = ["interrupt", "terminate"]
            run_for_secs = 30
            "#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.lifecycle.shutdown_timeout_ms, 2000);
        assert_eq!(config.lifecycle.signals.len(), 2);
        assert_eq!(config.lifecycle.run_for_secs, Some(30));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/orchestrator.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_error() {
        let file = write_config("[lifecycle\nshutdown_timeout_ms = ");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validation_error_lists_every_problem() {
        let file = write_config(
            r#"
            [lifecycle]
            shutdown_timeout_ms = 0

            [observability]
            log_level = "loud"
            "#,
        );

        let err = load_config(file.path()).unwrap_err();
        match &err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        let message = err.to_string();
        assert!(message.contains("shutdown_timeout_ms"));
        assert!(message.contains("loud"));
    }
}
