//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator, threads, hooks produce:
//!     → logging.rs (structured log events, per-unit spans)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Every thread, shutdown procedure and hook runs inside its own span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
