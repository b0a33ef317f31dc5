//! Thread registry and launch bookkeeping.
//!
//! # Data Flow
//! ```text
//! register(name, run)            (NotStarted)
//!     → launch()                 spawn every run fn with its own token + registrar
//!     → registrar.register(proc) procedure parked in the slot's oneshot
//!     → exits channel            one ThreadExit per finished task (panics converted)
//!     → shutdown walk            ready procedures invoked, every exit awaited
//! ```
//!
//! # Design Decisions
//! - A thread announces its stop routine only after it has started, so a
//!   listener can bind before it knows how to stop itself
//! - The registrar is consumed by `register`, so at most one procedure exists
//! - Outcomes are captured when each task completes, independent of shutdown
//! - Tokens are children of the caller's token; shutdown itself never cancels
//!   them, only abandonment at the deadline does

use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::lifecycle::deadline::Deadline;
use crate::lifecycle::error::{LifecycleError, UnitError, UnitKind, UnitResult};

type RunFn = Box<dyn FnOnce(CancellationToken, ShutdownRegistrar) -> BoxFuture<'static, UnitResult> + Send>;
type ProcedureFn = Box<dyn FnOnce(Deadline) -> BoxFuture<'static, UnitResult> + Send>;

/// The stop routine a thread supplies after it starts.
pub struct ShutdownProcedure {
    call: ProcedureFn,
}

impl ShutdownProcedure {
    pub(crate) fn invoke(self, deadline: Deadline) -> BoxFuture<'static, UnitResult> {
        (self.call)(deadline)
    }
}

/// One-shot channel through which a running thread hands over its shutdown procedure.
pub struct ShutdownRegistrar {
    thread: String,
    tx: oneshot::Sender<ShutdownProcedure>,
}

impl ShutdownRegistrar {
    /// Hand the shutdown procedure to the orchestrator.
    ///
    /// Never blocks. Returns false if the orchestrator is no longer
    /// listening (shutdown already started); the procedure is then dropped
    /// and the thread is awaited like any pending one until the deadline.
    pub fn register<F, Fut>(self, procedure: F) -> bool
    where
        F: FnOnce(Deadline) -> Fut + Send + 'static,
        Fut: Future<Output = UnitResult> + Send + 'static,
    {
        let procedure = ShutdownProcedure {
            call: Box::new(move |deadline| procedure(deadline).boxed()),
        };
        match self.tx.send(procedure) {
            Ok(()) => {
                tracing::debug!(thread = %self.thread, "Shutdown procedure registered");
                true
            }
            Err(_) => {
                tracing::warn!(
                    thread = %self.thread,
                    "Shutdown procedure registered after shutdown began; ignoring"
                );
                false
            }
        }
    }

    pub fn thread_name(&self) -> &str {
        &self.thread
    }
}

/// A registered, not yet launched thread.
struct ThreadSpec {
    name: String,
    run: RunFn,
}

/// Ordered collection of threads awaiting launch.
#[derive(Default)]
pub struct ThreadRegistry {
    threads: Vec<ThreadSpec>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a thread. Fails without side effects if the name is taken.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, run: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(CancellationToken, ShutdownRegistrar) -> Fut + Send + 'static,
        Fut: Future<Output = UnitResult> + Send + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return Err(LifecycleError::DuplicateName {
                kind: UnitKind::Thread,
                name,
            });
        }

        tracing::debug!(thread = %name, "Thread registered");
        self.threads.push(ThreadSpec {
            name,
            run: Box::new(move |token, registrar| run(token, registrar).boxed()),
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.threads.iter().any(|thread| thread.name == name)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.threads.iter().map(|thread| thread.name.as_str())
    }

    /// Start every registered thread as an independent task.
    ///
    /// Must be called from within a Tokio runtime, exactly once.
    pub(crate) fn launch(self, parent: &CancellationToken) -> LaunchedThreads {
        let (exit_tx, exits) = mpsc::unbounded_channel();
        let mut slots = Vec::with_capacity(self.threads.len());

        for (index, spec) in self.threads.into_iter().enumerate() {
            let token = parent.child_token();
            let (tx, procedure_rx) = oneshot::channel();
            let registrar = ShutdownRegistrar {
                thread: spec.name.clone(),
                tx,
            };

            let span = tracing::info_span!("thread", name = %spec.name);
            let run = spec.run;
            let thread_token = token.clone();
            // The run fn itself is called inside the task so a panic while
            // building the future is caught like any other.
            let task = tokio::spawn(async move { run(thread_token, registrar).await }.instrument(span));
            let abort = task.abort_handle();

            let exit_tx = exit_tx.clone();
            tokio::spawn(async move {
                let outcome = match task.await {
                    Ok(result) => result.map_err(UnitError::Failed),
                    Err(err) => Err(UnitError::from_join(err)),
                };
                let _ = exit_tx.send(ThreadExit { index, outcome });
            });

            tracing::info!(thread = %spec.name, "Thread launched");
            slots.push(ThreadSlot {
                name: spec.name,
                token,
                abort,
                procedure_rx: Some(procedure_rx),
                procedure: None,
                registration: RegistrationStatus::Pending,
                phase: ThreadPhase::Running,
                outcome: None,
                procedure_error: None,
                timed_out: false,
            });
        }

        LaunchedThreads { slots, exits }
    }
}

/// Whether and how a thread supplied its shutdown procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// Still inside the registration window.
    Pending,
    /// A procedure was captured.
    Registered,
    /// The thread dropped its registrar without sending (or finished first).
    NotSupplied,
    /// The registration window elapsed with neither a procedure nor an exit.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThreadPhase {
    Running,
    Stopping,
    Terminated,
    Abandoned,
}

/// Completion report sent by a thread's supervisor task.
pub(crate) struct ThreadExit {
    index: usize,
    outcome: Result<(), UnitError>,
}

pub(crate) struct ThreadSlot {
    name: String,
    token: CancellationToken,
    abort: AbortHandle,
    procedure_rx: Option<oneshot::Receiver<ShutdownProcedure>>,
    procedure: Option<ShutdownProcedure>,
    registration: RegistrationStatus,
    phase: ThreadPhase,
    outcome: Option<Result<(), UnitError>>,
    procedure_error: Option<UnitError>,
    timed_out: bool,
}

impl ThreadSlot {
    /// Move a procedure out of the channel if one has arrived.
    fn poll_procedure(&mut self) {
        let Some(rx) = self.procedure_rx.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok(procedure) => {
                self.procedure_rx = None;
                self.procedure = Some(procedure);
                self.registration = RegistrationStatus::Registered;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                self.procedure_rx = None;
                self.registration = RegistrationStatus::NotSupplied;
            }
        }
    }

    fn is_finished(&self) -> bool {
        matches!(self.phase, ThreadPhase::Terminated | ThreadPhase::Abandoned)
    }
}

/// Procedure captured at shutdown, tagged with its thread.
pub(crate) struct ReadyProcedure {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) procedure: ShutdownProcedure,
}

/// Per-thread result handed to the report.
pub(crate) struct ThreadOutcome {
    pub(crate) name: String,
    pub(crate) registration: RegistrationStatus,
    pub(crate) error: Option<LifecycleError>,
}

/// Runtime view of launched threads, owned by the orchestrator's control loop.
pub(crate) struct LaunchedThreads {
    slots: Vec<ThreadSlot>,
    exits: mpsc::UnboundedReceiver<ThreadExit>,
}

impl LaunchedThreads {
    pub(crate) fn all_exited(&self) -> bool {
        self.slots.iter().all(ThreadSlot::is_finished)
    }

    pub(crate) fn running_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_finished()).count()
    }

    /// Wait for the next thread to finish. Pending forever once all have.
    pub(crate) async fn next_exit(&mut self) -> ThreadExit {
        if self.all_exited() {
            return std::future::pending().await;
        }
        match self.exits.recv().await {
            Some(exit) => exit,
            // Every supervisor holds a sender until it reports, so this is unreachable
            // while a thread is still running.
            None => std::future::pending().await,
        }
    }

    /// Record a finished thread. Returns its name.
    pub(crate) fn record_exit(&mut self, exit: ThreadExit) -> &str {
        let slot = &mut self.slots[exit.index];
        // A procedure sent right before returning still counts as registered.
        slot.poll_procedure();
        slot.procedure = None;
        match &exit.outcome {
            Ok(()) => tracing::info!(thread = %slot.name, "Thread finished"),
            Err(err) => tracing::error!(thread = %slot.name, error = %err, "Thread finished with error"),
        }
        slot.phase = ThreadPhase::Terminated;
        slot.outcome = Some(exit.outcome);
        &slot.name
    }

    /// Mark threads that are still silent after the registration window.
    pub(crate) fn check_registrations(&mut self, timeout: Duration) {
        for slot in &mut self.slots {
            if slot.is_finished() {
                continue;
            }
            slot.poll_procedure();
            if slot.registration == RegistrationStatus::Pending {
                slot.registration = RegistrationStatus::TimedOut;
                crate::observability::metrics::record_registration_timeout();
                let err = LifecycleError::RegistrationTimeout {
                    name: slot.name.clone(),
                    timeout,
                };
                tracing::warn!(error = %err, "Thread keeps running without a shutdown procedure");
            }
        }
    }

    /// Fix the ready set: every procedure that has arrived by now.
    ///
    /// Threads without one stay pending and are only awaited.
    pub(crate) fn take_ready(&mut self) -> Vec<ReadyProcedure> {
        let mut ready = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_finished() {
                continue;
            }
            slot.poll_procedure();
            if let Some(procedure) = slot.procedure.take() {
                slot.phase = ThreadPhase::Stopping;
                ready.push(ReadyProcedure {
                    index,
                    name: slot.name.clone(),
                    procedure,
                });
            }
            // Late registrations are rejected from here on.
            slot.procedure_rx = None;
        }
        ready
    }

    pub(crate) fn record_procedure(&mut self, index: usize, result: Result<(), UnitError>) {
        let slot = &mut self.slots[index];
        match result {
            Ok(()) => tracing::info!(thread = %slot.name, "Shutdown procedure completed"),
            Err(err) => {
                tracing::error!(thread = %slot.name, error = %err, "Shutdown procedure failed");
                slot.procedure_error = Some(err);
            }
        }
    }

    pub(crate) fn record_procedure_timeout(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        tracing::warn!(thread = %slot.name, "Shutdown procedure exceeded the deadline; abandoned");
        slot.timed_out = true;
    }

    /// Give up on every thread still running at the deadline.
    ///
    /// The token is cancelled first so tasks the thread spawned itself see
    /// the stop, then the thread's own task is aborted.
    pub(crate) fn abandon_remaining(&mut self) {
        for slot in &mut self.slots {
            if slot.is_finished() {
                continue;
            }
            tracing::warn!(thread = %slot.name, "Thread did not stop before the deadline; abandoned");
            slot.token.cancel();
            slot.abort.abort();
            slot.phase = ThreadPhase::Abandoned;
            slot.timed_out = true;
        }
    }

    /// Resolve each thread's final entry.
    ///
    /// Precedence: run error, then procedure error, then timeout.
    pub(crate) fn into_outcomes(self, budget: Duration) -> Vec<ThreadOutcome> {
        self.slots
            .into_iter()
            .map(|slot| {
                let registration = match slot.registration {
                    RegistrationStatus::Pending if slot.phase == ThreadPhase::Terminated => {
                        RegistrationStatus::NotSupplied
                    }
                    status => status,
                };
                let error = match (slot.outcome, slot.procedure_error) {
                    (Some(Err(source)), _) | (_, Some(source)) => Some(LifecycleError::Unit {
                        kind: UnitKind::Thread,
                        name: slot.name.clone(),
                        source,
                    }),
                    _ if slot.timed_out => Some(LifecycleError::ShutdownTimeout {
                        kind: UnitKind::Thread,
                        name: slot.name.clone(),
                        budget,
                    }),
                    _ => None,
                };
                ThreadOutcome {
                    name: slot.name,
                    registration,
                    error,
                }
            })
            .collect()
    }
}
