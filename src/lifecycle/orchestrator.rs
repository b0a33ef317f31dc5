//! Lifecycle orchestrator.
//!
//! Owns the thread and hook registries, launches threads, waits for the
//! first termination trigger and drives the two-phase shutdown:
//!
//! ```text
//! trigger
//!   → ready procedures invoked concurrently (each bounded by the global deadline)
//!   → every thread task awaited until the deadline, pending ones get no stop signal
//!   → stragglers have their token cancelled and are abandoned
//!   → hooks invoked one by one in registration order
//!   → Stopped, ShutdownReport returned
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::LifecycleConfig;
use crate::lifecycle::deadline::Deadline;
use crate::lifecycle::error::{LifecycleError, UnitError, UnitKind, UnitResult};
use crate::lifecycle::hooks::HookRegistry;
use crate::lifecycle::report::{ShutdownReport, UnitReport};
use crate::lifecycle::signals::{ShutdownSignal, ShutdownTrigger, SignalSource, StopHandle};
use crate::lifecycle::state::{LifecycleState, StateCell};
use crate::lifecycle::threads::{LaunchedThreads, ShutdownRegistrar, ThreadRegistry};

/// Starts threads, waits for a trigger, and shuts everything down in order.
pub struct Orchestrator {
    shutdown_timeout: Duration,
    registration_timeout: Duration,
    hook_min_grace: Duration,
    state: StateCell,
    signal: ShutdownSignal,
    sources: Vec<Box<dyn SignalSource>>,
    threads: ThreadRegistry,
    hooks: HookRegistry,
}

impl Orchestrator {
    pub fn new(config: &LifecycleConfig) -> Self {
        Self {
            shutdown_timeout: config.shutdown_timeout(),
            registration_timeout: config.registration_timeout(),
            hook_min_grace: config.hook_min_grace(),
            state: StateCell::new(),
            signal: ShutdownSignal::new(),
            sources: Vec::new(),
            threads: ThreadRegistry::new(),
            hooks: HookRegistry::new(),
        }
    }

    /// Add a termination source. The first source to fire wins.
    ///
    /// Fails once the orchestrator has been run.
    pub fn with_signal_source(mut self, source: impl SignalSource) -> Result<Self, LifecycleError> {
        self.add_signal_source(Box::new(source))?;
        Ok(self)
    }

    pub fn add_signal_source(&mut self, source: Box<dyn SignalSource>) -> Result<(), LifecycleError> {
        self.ensure_not_started("add a signal source")?;
        self.sources.push(source);
        Ok(())
    }

    /// Register a long-running thread.
    ///
    /// `run` receives a cancellation token and a registrar through which it
    /// may hand over its shutdown procedure once it is ready to be stopped.
    pub fn register_thread<F, Fut>(&mut self, name: impl Into<String>, run: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(CancellationToken, ShutdownRegistrar) -> Fut + Send + 'static,
        Fut: Future<Output = UnitResult> + Send + 'static,
    {
        self.ensure_not_started("register a thread")?;
        self.threads.register(name, run)
    }

    /// Register a cleanup action run once, after every thread has stopped.
    pub fn register_hook<F, Fut>(&mut self, name: impl Into<String>, action: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(Deadline) -> Fut + Send + 'static,
        Fut: Future<Output = UnitResult> + Send + 'static,
    {
        self.ensure_not_started("register a hook")?;
        self.hooks.register(name, action)
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn subscribe_state(&self) -> tokio::sync::watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Handle that requests shutdown when called. Usable from any task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.signal.clone())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    fn ensure_not_started(&self, operation: &'static str) -> Result<(), LifecycleError> {
        match self.state.get() {
            LifecycleState::NotStarted => Ok(()),
            state => Err(LifecycleError::InvalidState { operation, state }),
        }
    }

    /// Run until a trigger fires, then shut down and report.
    ///
    /// `upstream` is treated exactly like any other signal source and is the
    /// parent of every thread token, so cancelling it reaches every thread. Fails only
    /// if the orchestrator has already been run.
    pub async fn run(&mut self, upstream: CancellationToken) -> Result<ShutdownReport, LifecycleError> {
        self.ensure_not_started("run")?;
        self.state.advance(LifecycleState::Running);
        let started = Instant::now();

        let threads = std::mem::take(&mut self.threads);
        let hooks = std::mem::take(&mut self.hooks);
        tracing::info!(
            threads = threads.len(),
            hooks = hooks.len(),
            shutdown_timeout = ?self.shutdown_timeout,
            "Orchestrator starting"
        );

        let parent = upstream.clone();
        let mut listeners = Vec::with_capacity(self.sources.len() + 1);
        for source in std::iter::once(Box::new(upstream) as Box<dyn SignalSource>)
            .chain(self.sources.drain(..))
        {
            tracing::debug!(source = source.name(), "Signal source attached");
            listeners.push(tokio::spawn(source.listen(self.signal.clone())));
        }

        let sequence = Sequence {
            registration_timeout: self.registration_timeout,
            hook_min_grace: self.hook_min_grace,
            signal: self.signal.clone(),
        };
        let mut launched = threads.launch(&parent);
        sequence.wait_for_trigger(&mut launched).await;

        self.state.advance(LifecycleState::ShuttingDown);
        let trigger = self
            .signal
            .trigger()
            .cloned()
            .unwrap_or(ShutdownTrigger::Stop);
        tracing::info!(trigger = %trigger, running = launched.running_count(), "Shutting down");

        let deadline = Deadline::after(self.shutdown_timeout);
        sequence.stop_threads(&mut launched, deadline).await;

        let mut units: Vec<UnitReport> = launched
            .into_outcomes(self.shutdown_timeout)
            .into_iter()
            .map(|outcome| UnitReport {
                name: outcome.name,
                kind: UnitKind::Thread,
                error: outcome.error,
                registration: Some(outcome.registration),
            })
            .collect();
        units.extend(sequence.run_hooks(hooks, deadline).await);

        for listener in listeners {
            listener.abort();
        }
        self.state.advance(LifecycleState::Stopped);

        let report = ShutdownReport {
            trigger,
            units,
            elapsed: started.elapsed(),
        };
        report.record_metrics();
        Ok(report)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(&LifecycleConfig::default())
    }
}

/// Timing and trigger state the shutdown sequence runs with.
///
/// Kept apart from `Orchestrator` so the futures in `run` only borrow
/// `Sync` data.
struct Sequence {
    registration_timeout: Duration,
    hook_min_grace: Duration,
    signal: ShutdownSignal,
}

impl Sequence {
    /// Block until a source fires or a thread exits on its own.
    async fn wait_for_trigger(&self, launched: &mut LaunchedThreads) {
        let registration_window = tokio::time::sleep(self.registration_timeout);
        tokio::pin!(registration_window);
        let mut window_open = launched.running_count() > 0;

        loop {
            tokio::select! {
                biased;
                _ = self.signal.fired() => return,
                exit = launched.next_exit() => {
                    let name = launched.record_exit(exit).to_string();
                    self.signal.fire(ShutdownTrigger::ThreadExited(name));
                }
                _ = &mut registration_window, if window_open => {
                    window_open = false;
                    launched.check_registrations(self.registration_timeout);
                }
            }
        }
    }

    /// Phase one: invoke ready procedures, then await every thread.
    ///
    /// Pending threads get no stop signal; they are waited on until the deadline.
    async fn stop_threads(&self, launched: &mut LaunchedThreads, deadline: Deadline) {
        let ready = launched.take_ready();
        tracing::info!(
            ready = ready.len(),
            pending = launched.running_count() - ready.len(),
            "Invoking shutdown procedures"
        );

        let mut outstanding: Vec<usize> = ready.iter().map(|ready| ready.index).collect();
        let mut stopping = JoinSet::new();
        for ready in ready {
            let span = tracing::info_span!("shutdown_procedure", thread = %ready.name);
            let index = ready.index;
            let procedure = ready.procedure;
            let call =
                AssertUnwindSafe(async move { procedure.invoke(deadline).await }).catch_unwind();
            stopping.spawn(
                async move {
                    let outcome = match tokio::time::timeout_at(deadline.instant(), call).await {
                        Ok(Ok(result)) => Some(result.map_err(UnitError::Failed)),
                        Ok(Err(payload)) => Some(Err(UnitError::from_panic(payload))),
                        Err(_elapsed) => None,
                    };
                    (index, outcome)
                }
                .instrument(span),
            );
        }

        loop {
            if launched.all_exited() && stopping.is_empty() {
                break;
            }
            tokio::select! {
                exit = launched.next_exit() => {
                    launched.record_exit(exit);
                }
                Some(joined) = stopping.join_next() => match joined {
                    Ok((index, outcome)) => {
                        outstanding.retain(|&i| i != index);
                        match outcome {
                            Some(result) => launched.record_procedure(index, result),
                            None => launched.record_procedure_timeout(index),
                        }
                    }
                    Err(err) => tracing::error!(error = %err, "Shutdown procedure task failed to join"),
                },
                _ = deadline.elapsed() => {
                    launched.abandon_remaining();
                    break;
                }
            }
        }

        stopping.abort_all();
        for index in outstanding {
            launched.record_procedure_timeout(index);
        }
    }

    /// Phase two: run every hook in registration order, continuing past failures.
    async fn run_hooks(&self, hooks: HookRegistry, deadline: Deadline) -> Vec<UnitReport> {
        let mut reports = Vec::with_capacity(hooks.len());
        if !hooks.is_empty() {
            tracing::info!(hooks = hooks.len(), remaining = ?deadline.remaining(), "Running termination hooks");
        }

        for hook in hooks {
            let name = hook.name().to_string();
            let hook_deadline = deadline.or_grace(self.hook_min_grace);
            let budget = hook_deadline.remaining();
            let span = tracing::info_span!("hook", name = %name);
            let task: JoinHandle<UnitResult> =
                tokio::spawn(async move { hook.invoke(hook_deadline).await }.instrument(span));
            let abort = task.abort_handle();

            let failure = match tokio::time::timeout_at(hook_deadline.instant(), task).await {
                Ok(Ok(Ok(()))) => None,
                Ok(Ok(Err(e))) => Some(UnitError::Failed(e)),
                Ok(Err(join_err)) => Some(UnitError::from_join(join_err)),
                Err(_elapsed) => {
                    abort.abort();
                    tracing::warn!(hook = %name, "Termination hook exceeded the deadline; abandoned");
                    reports.push(UnitReport {
                        error: Some(LifecycleError::ShutdownTimeout {
                            kind: UnitKind::Hook,
                            name: name.clone(),
                            budget,
                        }),
                        name,
                        kind: UnitKind::Hook,
                        registration: None,
                    });
                    continue;
                }
            };

            let error = match failure {
                None => {
                    tracing::info!(hook = %name, "Termination hook completed");
                    None
                }
                Some(source) => {
                    tracing::error!(hook = %name, error = %source, "Termination hook failed");
                    Some(LifecycleError::Unit {
                        kind: UnitKind::Hook,
                        name: name.clone(),
                        source,
                    })
                }
            };
            reports.push(UnitReport {
                name,
                kind: UnitKind::Hook,
                error,
                registration: None,
            });
        }
        reports
    }
}

