//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use shutdown_orchestrator::config::{LifecycleConfig, ServerConfig};
use shutdown_orchestrator::lifecycle::{Orchestrator, ShutdownRegistrar, UnitResult};

pub fn lifecycle(shutdown_ms: u64, registration_ms: u64) -> LifecycleConfig {
    LifecycleConfig {
        shutdown_timeout_ms: shutdown_ms,
        registration_timeout_ms: registration_ms,
        hook_min_grace_ms: 100,
        signals: Vec::new(),
        run_for_secs: None,
    }
}

pub fn orchestrator(shutdown_ms: u64) -> Orchestrator {
    Orchestrator::new(&lifecycle(shutdown_ms, 1_000))
}

/// Fire the orchestrator's stop handle after `delay`.
pub fn stop_after(orchestrator: &Orchestrator, delay: Duration) {
    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        stop.stop();
    });
}

/// Thread body that only stops through its own shutdown procedure.
///
/// The procedure spends `drain` before releasing the run loop.
pub async fn serve_until_drained(registrar: ShutdownRegistrar, drain: Duration) -> UnitResult {
    let stopped = CancellationToken::new();
    let release = stopped.clone();
    registrar.register(move |_deadline| async move {
        tokio::time::sleep(drain).await;
        release.cancel();
        Ok(())
    });
    stopped.cancelled().await;
    Ok(())
}

/// Ordered record of what happened, with timestamps relative to creation.
#[derive(Clone)]
pub struct EventLog {
    start: Instant,
    events: Arc<Mutex<Vec<(String, Duration)>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events
            .lock()
            .unwrap()
            .push((event.into(), self.start.elapsed()));
    }

    pub fn names(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn at(&self, event: &str) -> Option<Duration> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == event)
            .map(|(_, at)| *at)
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|(name, _)| name == event).count()
    }
}

pub fn server(name: &str, port: u16) -> ServerConfig {
    ServerConfig {
        name: name.to_string(),
        bind_address: format!("127.0.0.1:{port}"),
    }
}

/// Poll until something accepts connections on `port`.
pub async fn wait_for_listener(port: u16) {
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on port {port}");
}
