//! Process lifecycle orchestrator.
//!
//! Runs long-lived threads, waits for the first termination trigger, stops
//! every thread under one global deadline, then runs termination hooks in
//! registration order and reports what happened to each unit.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod services;

pub use config::OrchestratorConfig;
pub use lifecycle::{Orchestrator, ShutdownReport};
