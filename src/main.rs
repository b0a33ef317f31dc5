//! Shutdown orchestrator demo binary.
//!
//! # Architecture Overview
//!
//! ```text
//!   SIGINT/SIGTERM/SIGHUP/SIGQUIT ─┐
//!   --run-for-secs ────────────────┼──▶ Orchestrator ──▶ ShutdownReport ──▶ exit code
//!                                  │        │
//!                  ┌───────────────┴────────┼─────────────────────┐
//!                  ▼                        ▼                     ▼
//!          http.server(1)           http.server(2)        hooks, in order:
//!          (thread, drains)         (thread, drains)      component-1..4, kv-store
//!                  └──────────┬─────────────┘
//!                             ▼
//!                      shared KvStore
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use shutdown_orchestrator::config::{load_config, validate_config, ConfigError, OrchestratorConfig};
use shutdown_orchestrator::lifecycle::{OsSignals, Orchestrator, RunFor};
use shutdown_orchestrator::observability::{logging, metrics};
use shutdown_orchestrator::services::register_services;

#[derive(Parser)]
#[command(name = "shutdown-orchestrator")]
#[command(about = "Runs HTTP servers and components under an ordered, deadline-bounded shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Global shutdown deadline in milliseconds
    #[arg(long)]
    shutdown_timeout_ms: Option<u64>,

    /// Shut down on our own after this many seconds
    #[arg(long)]
    run_for_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut OrchestratorConfig) {
        if let Some(timeout) = self.shutdown_timeout_ms {
            config.lifecycle.shutdown_timeout_ms = timeout;
        }
        if let Some(secs) = self.run_for_secs {
            config.lifecycle.run_for_secs = Some(secs);
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => OrchestratorConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "shutdown-orchestrator starting");

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let mut orchestrator = Orchestrator::new(&config.lifecycle)
        .with_signal_source(OsSignals::new(config.lifecycle.signals.iter().copied()))?;
    if let Some(run_for) = config.lifecycle.run_for() {
        orchestrator = orchestrator.with_signal_source(RunFor(run_for))?;
    }
    register_services(&mut orchestrator, &config.services)?;

    let report = orchestrator.run(CancellationToken::new()).await?;
    report.log_summary();

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
