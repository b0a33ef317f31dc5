//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → OrchestratorConfig (validated, immutable)
//!     → CLI overrides applied by the binary
//!     → handed to the orchestrator and services
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ComponentConfig, LifecycleConfig, LogFormat, ObservabilityConfig, OrchestratorConfig,
    ServerConfig, ServicesConfig,
};
pub use validation::{validate_config, ValidationError};
