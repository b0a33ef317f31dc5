//! Termination triggers.
//!
//! # Responsibilities
//! - Coalesce every trigger (OS signal, explicit stop, upstream
//!   cancellation, deadline, unexpected thread exit) into one event
//! - Remember which trigger won
//! - Ignore every later trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGINT/SIGTERM/SIGHUP/SIGQUIT all mean "shut down"
//! - Repeated signals are swallowed and logged; they never force an exit
//!   or queue a second shutdown

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// What caused the shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// An OS process signal.
    Signal(TerminationSignal),
    /// `StopHandle::stop` was called.
    Stop,
    /// The upstream cancellation token passed to `run` (or a composed one) fired.
    Upstream,
    /// A `RunFor` source reached its deadline.
    Deadline,
    /// A thread's run function returned while the orchestrator was running.
    ThreadExited(String),
}

impl std::fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownTrigger::Signal(signal) => write!(f, "signal {}", signal),
            ShutdownTrigger::Stop => f.write_str("stop requested"),
            ShutdownTrigger::Upstream => f.write_str("upstream cancellation"),
            ShutdownTrigger::Deadline => f.write_str("run deadline reached"),
            ShutdownTrigger::ThreadExited(name) => write!(f, "thread '{}' exited", name),
        }
    }
}

/// Process signals recognized as termination requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
    Hangup,
    Quit,
}

impl TerminationSignal {
    pub const ALL: [TerminationSignal; 4] = [
        TerminationSignal::Interrupt,
        TerminationSignal::Terminate,
        TerminationSignal::Hangup,
        TerminationSignal::Quit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::Hangup => "SIGHUP",
            TerminationSignal::Quit => "SIGQUIT",
        }
    }
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First-fire-wins shutdown latch shared by all sources.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    trigger: Arc<OnceLock<ShutdownTrigger>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns true if this call was the first.
    pub fn fire(&self, trigger: ShutdownTrigger) -> bool {
        match self.trigger.set(trigger) {
            Ok(()) => {
                if let Some(trigger) = self.trigger.get() {
                    tracing::info!(trigger = %trigger, "Shutdown requested");
                }
                self.token.cancel();
                true
            }
            Err(ignored) => {
                tracing::debug!(trigger = %ignored, "Shutdown already requested; ignoring trigger");
                false
            }
        }
    }

    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The winning trigger, once fired.
    pub fn trigger(&self) -> Option<&ShutdownTrigger> {
        self.trigger.get()
    }

    /// Resolves once any source has fired.
    pub async fn fired(&self) {
        self.token.cancelled().await
    }
}

/// Something that can request termination.
///
/// Sources are spawned when the orchestrator starts and aborted once it
/// stops. A source may fire as often as it likes; only the first fire
/// across all sources has an effect.
pub trait SignalSource: Send + 'static {
    fn name(&self) -> &'static str;

    fn listen(self: Box<Self>, signal: ShutdownSignal) -> BoxFuture<'static, ()>;
}

/// Explicit-call trigger.
#[derive(Debug, Clone)]
pub struct StopHandle {
    signal: ShutdownSignal,
}

impl StopHandle {
    pub(crate) fn new(signal: ShutdownSignal) -> Self {
        Self { signal }
    }

    /// Ask the orchestrator to shut down. Returns false if it already is.
    pub fn stop(&self) -> bool {
        self.signal.fire(ShutdownTrigger::Stop)
    }

    pub fn is_stopping(&self) -> bool {
        self.signal.is_fired()
    }
}

/// Upstream cancellation: a parent token propagates shutdown down.
impl SignalSource for CancellationToken {
    fn name(&self) -> &'static str {
        "upstream"
    }

    fn listen(self: Box<Self>, signal: ShutdownSignal) -> BoxFuture<'static, ()> {
        async move {
            self.cancelled().await;
            signal.fire(ShutdownTrigger::Upstream);
        }
        .boxed()
    }
}

/// Deadline trigger: request shutdown after a fixed run time.
#[derive(Debug, Clone, Copy)]
pub struct RunFor(pub Duration);

impl SignalSource for RunFor {
    fn name(&self) -> &'static str {
        "run-for"
    }

    fn listen(self: Box<Self>, signal: ShutdownSignal) -> BoxFuture<'static, ()> {
        async move {
            tokio::time::sleep(self.0).await;
            signal.fire(ShutdownTrigger::Deadline);
        }
        .boxed()
    }
}

/// OS process-signal listener.
#[derive(Debug, Clone)]
pub struct OsSignals {
    signals: Vec<TerminationSignal>,
}

impl OsSignals {
    pub fn new(signals: impl IntoIterator<Item = TerminationSignal>) -> Self {
        Self {
            signals: signals.into_iter().collect(),
        }
    }
}

impl Default for OsSignals {
    fn default() -> Self {
        Self::new(TerminationSignal::ALL)
    }
}

impl SignalSource for OsSignals {
    fn name(&self) -> &'static str {
        "os-signals"
    }

    fn listen(self: Box<Self>, signal: ShutdownSignal) -> BoxFuture<'static, ()> {
        async move {
            if let Err(e) = listen_os(&self.signals, &signal).await {
                tracing::error!(error = %e, "Failed to install OS signal handlers");
            }
        }
        .boxed()
    }
}

#[cfg(unix)]
async fn listen_os(kinds: &[TerminationSignal], signal: &ShutdownSignal) -> std::io::Result<()> {
    use futures_util::stream::{FuturesUnordered, StreamExt};
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    let mut streams = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let sig_kind = match kind {
            TerminationSignal::Interrupt => SignalKind::interrupt(),
            TerminationSignal::Terminate => SignalKind::terminate(),
            TerminationSignal::Hangup => SignalKind::hangup(),
            TerminationSignal::Quit => SignalKind::quit(),
        };
        streams.push((*kind, unix_signal(sig_kind)?));
    }
    tracing::debug!(signals = ?kinds, "OS signal handlers installed");

    loop {
        let received = {
            let mut pending: FuturesUnordered<_> = streams
                .iter_mut()
                .map(|(kind, stream)| async move { stream.recv().await.map(|_| *kind) })
                .collect();
            match pending.next().await {
                Some(Some(kind)) => kind,
                // Signal streams only end when the runtime shuts down.
                _ => return Ok(()),
            }
        };

        if signal.is_fired() {
            tracing::warn!(signal = %received, "Signal received while already shutting down; ignoring");
        } else {
            tracing::info!(signal = %received, "Termination signal received");
            signal.fire(ShutdownTrigger::Signal(received));
        }
    }
}

#[cfg(not(unix))]
async fn listen_os(_kinds: &[TerminationSignal], signal: &ShutdownSignal) -> std::io::Result<()> {
    loop {
        tokio::signal::ctrl_c().await?;
        if signal.is_fired() {
            tracing::warn!("Ctrl+C received while already shutting down; ignoring");
        } else {
            signal.fire(ShutdownTrigger::Signal(TerminationSignal::Interrupt));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fire_wins() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_fired());

        assert!(signal.fire(ShutdownTrigger::Stop));
        assert!(!signal.fire(ShutdownTrigger::Upstream));
        assert!(!signal.fire(ShutdownTrigger::Stop));

        assert!(signal.is_fired());
        assert_eq!(signal.trigger(), Some(&ShutdownTrigger::Stop));
    }

    #[tokio::test]
    async fn test_stop_handle_is_idempotent() {
        let signal = ShutdownSignal::new();
        let handle = StopHandle::new(signal.clone());

        assert!(handle.stop());
        assert!(!handle.stop());
        signal.fired().await;
        assert!(handle.is_stopping());
    }

    #[tokio::test]
    async fn test_upstream_token_fires_signal() {
        let signal = ShutdownSignal::new();
        let upstream = CancellationToken::new();
        let listener = tokio::spawn(Box::new(upstream.clone()).listen(signal.clone()));

        upstream.cancel();
        signal.fired().await;
        listener.await.unwrap();
        assert_eq!(signal.trigger(), Some(&ShutdownTrigger::Upstream));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_for_fires_after_duration() {
        let signal = ShutdownSignal::new();
        let start = tokio::time::Instant::now();
        tokio::spawn(Box::new(RunFor(Duration::from_secs(3))).listen(signal.clone()));

        signal.fired().await;
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(signal.trigger(), Some(&ShutdownTrigger::Deadline));
    }

    #[test]
    fn test_signal_names_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            signals: Vec<TerminationSignal>,
        }
        let parsed: Wrapper = toml::from_str(r#"signals = ["interrupt", "quit"]"#).unwrap();
        assert_eq!(
            parsed.signals,
            [TerminationSignal::Interrupt, TerminationSignal::Quit]
        );
    }
}
