//! # Run state shared between a routine and its handles.
//!
//! ```text
//! Constructed ──execute──► Running ──trigger──► Stopping ──cleanup──► Stopped
//!                             ▲                                          │
//!                             └──────────────── execute ◄────────────────┘
//! ```
//!
//! [`Handle`] is the cheap, clonable view of a [`Routine`](crate::Routine): it observes the
//! state, requests shutdown and spawns tracked work into the current run. Executors running
//! inside a run reach it through [`Context::routine`](crate::Context::routine).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::error::Error;
use crate::executors::ExecutorRef;

/// Lifecycle state of a routine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Never executed.
    Constructed,
    /// Inside `execute`, before shutdown began.
    Running,
    /// Shutdown began: waiting for tracked tasks and cleanup.
    Stopping,
    /// The last run is over.
    Stopped,
}

#[derive(Clone, Copy, Debug)]
struct Status {
    state: State,
    /// Number of runs entered so far.
    runs: u64,
    /// Last run whose executors were launched.
    served: u64,
}

struct RunScope {
    stop: CancellationToken,
    ctx: Option<Context>,
}

pub(crate) struct Shared {
    status: watch::Sender<Status>,
    active: AtomicBool,
    run: Mutex<Option<RunScope>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        let (status, _) = watch::channel(Status {
            state: State::Constructed,
            runs: 0,
            served: 0,
        });
        Self {
            status,
            active: AtomicBool::new(false),
            run: Mutex::new(None),
        }
    }

    fn run(&self) -> MutexGuard<'_, Option<RunScope>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> State {
        self.status.borrow().state
    }

    /// Starts a run; `None` if one is already in progress.
    pub(crate) fn enter(&self) -> Option<Entered<'_>> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let stop = CancellationToken::new();
        *self.run() = Some(RunScope {
            stop: stop.clone(),
            ctx: None,
        });
        self.status.send_modify(|s| {
            s.state = State::Running;
            s.runs += 1;
        });
        Some(Entered { shared: self, stop })
    }

    /// Publishes the run context for [`Handle::go`].
    pub(crate) fn attach(&self, ctx: &Context) {
        if let Some(scope) = self.run().as_mut() {
            scope.ctx = Some(ctx.clone());
        }
    }

    /// Marks the current run as serving (main and children launched).
    pub(crate) fn serve(&self) {
        self.status.send_modify(|s| s.served = s.runs);
    }

    /// Detaches the run context and enters `Stopping`.
    ///
    /// Runs under the `run` lock, so a concurrent [`Handle::go`] either registers with the
    /// tracker before the join starts or fails.
    pub(crate) fn stopping(&self) {
        let mut run = self.run();
        if let Some(scope) = run.as_mut() {
            scope.ctx = None;
        }
        self.status.send_modify(|s| s.state = State::Stopping);
    }
}

/// Active-run marker; dropping it ends the run.
pub(crate) struct Entered<'a> {
    shared: &'a Shared,
    stop: CancellationToken,
}

impl Entered<'_> {
    pub(crate) fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        *self.shared.run() = None;
        self.shared.status.send_modify(|s| s.state = State::Stopped);
        self.shared.active.store(false, Ordering::Release);
    }
}

/// Clonable control handle of a routine.
#[derive(Clone)]
pub struct Handle {
    shared: Arc<Shared>,
}

impl Handle {
    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.shared.state()
    }

    /// Returns `true` while a run is in progress (running or stopping).
    pub fn is_active(&self) -> bool {
        matches!(self.state(), State::Running | State::Stopping)
    }

    /// Requests cooperative shutdown of the current run; no-op when idle.
    pub fn stop(&self) {
        if let Some(scope) = self.shared.run().as_ref() {
            scope.stop.cancel();
        }
    }

    /// Resolves once the current (or next) run has launched its executors.
    ///
    /// Also resolves if that run ends without launching anything (prepare failed).
    pub async fn serving(&self) {
        let mut rx = self.shared.status.subscribe();
        let now = *rx.borrow_and_update();
        let target = match now.state {
            State::Running | State::Stopping => now.runs,
            State::Constructed | State::Stopped => now.runs + 1,
        };
        let _ = rx
            .wait_for(|s| s.served >= target || (s.runs >= target && s.state == State::Stopped))
            .await;
    }

    /// Resolves once no run is in progress.
    pub async fn stopped(&self) {
        let mut rx = self.shared.status.subscribe();
        let _ = rx
            .wait_for(|s| matches!(s.state, State::Constructed | State::Stopped))
            .await;
    }

    /// Spawns `exec` as a tracked task of the current run.
    ///
    /// The task is cancelled and joined with the rest of the run. Fails with
    /// [`Error::NoContext`] when no run is serving.
    pub fn go(&self, exec: ExecutorRef) -> Result<JoinHandle<Result<(), Error>>, Error> {
        // registration with the tracker happens while the lock is held
        let run = self.shared.run();
        let ctx = run
            .as_ref()
            .and_then(|scope| scope.ctx.as_ref())
            .ok_or(Error::NoContext)?;
        Ok(ctx.go(exec))
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle").field("state", &self.state()).finish()
    }
}
