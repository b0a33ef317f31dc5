//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (hooks.rs, threads.rs):
//!     register_thread / register_hook → registries (NotStarted only)
//!
//! Run (orchestrator.rs):
//!     Launch threads → capture shutdown procedures → wait for trigger
//!
//! Triggers (signals.rs):
//!     SIGINT/SIGTERM/SIGHUP/SIGQUIT, StopHandle, upstream token,
//!     RunFor deadline, unexpected thread exit → one ShutdownSignal
//!
//! Shutdown (orchestrator.rs):
//!     Invoke ready procedures → await threads (deadline.rs) → run hooks
//!     → ShutdownReport (report.rs)
//! ```
//!
//! # Design Decisions
//! - Threads stop before hooks, so shared resources outlive their users
//! - One global deadline bounds the whole shutdown; stragglers are abandoned
//! - Unit failures are collected, never propagated as orchestrator failures
//! - State only moves forward (state.rs)

pub mod deadline;
pub mod error;
pub mod hooks;
pub mod orchestrator;
pub mod report;
pub mod signals;
pub mod state;
pub mod threads;

pub use deadline::Deadline;
pub use error::{BoxError, LifecycleError, UnitError, UnitKind, UnitResult};
pub use hooks::{Hook, HookRegistry};
pub use orchestrator::Orchestrator;
pub use report::{ShutdownReport, UnitReport};
pub use signals::{
    OsSignals, RunFor, ShutdownSignal, ShutdownTrigger, SignalSource, StopHandle, TerminationSignal,
};
pub use state::LifecycleState;
pub use threads::{RegistrationStatus, ShutdownProcedure, ShutdownRegistrar, ThreadRegistry};
