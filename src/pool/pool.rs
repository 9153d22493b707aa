//! # Bounded worker pool.
//!
//! A [`Pool`] runs submitted executors on background workers:
//!
//! ```text
//! go(ctx, exec) ──► try_send ──► [bounded queue] ──► worker 1..N ──► exec.execute(child ctx)
//!                     │ full                                              │
//!                     ├─► spawn a worker (if below max_concurrency)       ▼
//!                     └─► send (blocks until room; backpressure)      Submission
//! ```
//!
//! - `open` starts `running_size` workers bound to the given root context. Workers of an
//!   earlier open/close cycle still count against `max_concurrency`; as they exit, the current
//!   cycle is topped back up to `running_size`.
//! - When the queue is full a new worker is spawned, unless the live count already reached
//!   `max_concurrency`; the submission then waits for room in the queue.
//! - A worker idle for `clear_duration` exits if the live count is above `running_size`.
//! - `close` stops intake. Queued requests are drained and answered with
//!   [`Error::PoolClosed`]; jobs already running are left to finish.
//! - Cancelling the root context cancels running jobs cooperatively and stops every worker.
//!
//! ## Example
//! ```rust
//! use routine::{Context, ExecutorFn, Pool, PoolConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), routine::Error> {
//! let pool = Pool::new(PoolConfig::default());
//! let root = Context::new();
//! pool.open(&root);
//!
//! let job = pool
//!     .go(Context::new(), ExecutorFn::arc(|_ctx| async { Ok(()) }))
//!     .await?;
//! job.await?;
//!
//! pool.close();
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context as TaskContext, Poll};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};

use crate::context::{Arguments, Context};
use crate::error::Error;
use crate::executors::ExecutorRef;
use crate::pool::config::PoolConfig;
use crate::pool::worker::{WorkerSlot, work};

/// One queued job.
pub(crate) struct Request {
    pub(crate) ctx: Context,
    pub(crate) exec: ExecutorRef,
    pub(crate) reply: oneshot::Sender<Result<(), Error>>,
}

/// Receiving side of one open/close generation of the pool.
pub(crate) struct Queue {
    rx: AsyncMutex<mpsc::Receiver<Request>>,
    pub(crate) closed: AtomicBool,
}

impl Queue {
    pub(crate) async fn recv(&self) -> Option<Request> {
        self.rx.lock().await.recv().await
    }

    /// Refuses further requests and answers the queued ones with `PoolClosed`.
    pub(crate) async fn shut(&self) {
        let mut rx = self.rx.lock().await;
        rx.close();
        while let Ok(request) = rx.try_recv() {
            let _ = request.reply.send(Err(Error::PoolClosed));
        }
    }
}

pub(crate) struct State {
    /// Live workers of every generation.
    pub(crate) running: usize,
    /// Live workers attached to the current queue.
    serving: usize,
    /// Bumped by every `open`.
    pub(crate) generation: u64,
    tx: Option<mpsc::Sender<Request>>,
    queue: Option<Arc<Queue>>,
    root: Option<Context>,
}

impl State {
    /// Requests sitting in the current queue.
    pub(crate) fn pending(&self) -> usize {
        self.tx
            .as_ref()
            .map_or(0, |tx| tx.max_capacity() - tx.capacity())
    }

    /// Releases one worker slot of `generation`.
    pub(crate) fn release(&mut self, generation: u64) {
        self.running = self.running.saturating_sub(1);
        if generation == self.generation {
            self.serving = self.serving.saturating_sub(1);
        }
    }

    /// Returns `true` if a worker of `generation` is above the target size.
    pub(crate) fn surplus(&self, generation: u64, target: usize) -> bool {
        generation != self.generation || self.serving > target
    }
}

pub(crate) struct Inner {
    pub(crate) cfg: PoolConfig,
    fixed: Option<ExecutorRef>,
    state: Mutex<State>,
}

impl Inner {
    pub(crate) fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn running(&self) -> usize {
        self.state().running
    }

    /// Starts one worker on the current queue unless the cap is reached.
    pub(crate) fn spawn_worker(self: &Arc<Self>, state: &mut State) -> bool {
        if self
            .cfg
            .concurrency_limit()
            .is_some_and(|max| state.running >= max)
        {
            return false;
        }
        let (Some(queue), Some(root)) = (state.queue.clone(), state.root.clone()) else {
            return false;
        };
        state.running += 1;
        state.serving += 1;
        let slot = WorkerSlot::reserved(Arc::clone(self), state.generation);
        root.spawn(work(slot, queue, root.clone()));
        true
    }

    /// Tops the current queue back up to its initial worker count, within the cap.
    pub(crate) fn replenish(self: &Arc<Self>, state: &mut State) {
        let live = state.root.as_ref().is_some_and(|root| !root.is_cancelled());
        while live
            && state.tx.is_some()
            && state.serving < self.cfg.initial_workers()
            && self.spawn_worker(state)
        {}
    }
}

/// Bounded pool of background workers.
///
/// Cloning is cheap; clones share the same workers and queue.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Inner>,
}

impl Pool {
    /// Creates a closed pool; call [`open`](Self::open) before submitting.
    pub fn new(cfg: PoolConfig) -> Self {
        Self::build(cfg, None)
    }

    /// Creates a closed pool with a fixed executor for [`execute`](Self::execute).
    pub fn with_fixed(cfg: PoolConfig, exec: ExecutorRef) -> Self {
        Self::build(cfg, Some(exec))
    }

    fn build(cfg: PoolConfig, fixed: Option<ExecutorRef>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                fixed,
                state: Mutex::new(State {
                    running: 0,
                    serving: 0,
                    generation: 0,
                    tx: None,
                    queue: None,
                    root: None,
                }),
            }),
        }
    }

    /// Pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.cfg
    }

    /// Opens the pool and starts the initial workers, all bound to `root`.
    ///
    /// Opening an open pool is a no-op. Must be called within a tokio runtime.
    pub fn open(&self, root: &Context) {
        let mut state = self.inner.state();
        if state.tx.is_some() {
            return;
        }
        let (tx, rx) = mpsc::channel(self.inner.cfg.waiting_capacity());
        let queue = Arc::new(Queue {
            rx: AsyncMutex::new(rx),
            closed: AtomicBool::new(false),
        });
        state.generation += 1;
        state.serving = 0;
        state.tx = Some(tx);
        state.queue = Some(queue);
        state.root = Some(root.clone());

        self.inner.replenish(&mut state);
        tracing::debug!(
            workers = state.serving,
            running = state.running,
            "pool opened"
        );
    }

    /// Stops intake; queued requests are answered with [`Error::PoolClosed`].
    ///
    /// Closing a closed pool is a no-op.
    pub fn close(&self) {
        let mut state = self.inner.state();
        if let Some(queue) = state.queue.take() {
            queue.closed.store(true, Ordering::Release);
        }
        if state.tx.take().is_some() {
            tracing::debug!(running = state.running, "pool closed");
        }
        state.root = None;
    }

    /// Returns `true` between `open` and `close`.
    pub fn is_open(&self) -> bool {
        self.inner.state().tx.is_some()
    }

    /// Current number of live workers.
    pub fn running(&self) -> usize {
        self.inner.running()
    }

    /// Submits `exec` to run under a child of `ctx`.
    ///
    /// Waits while the queue is full and no worker may be added; the wait ends early with the
    /// context error if `ctx` is cancelled, or [`Error::PoolClosed`] if the pool shuts down.
    pub async fn go(&self, ctx: Context, exec: ExecutorRef) -> Result<Submission, Error> {
        let (tx, root) = {
            let state = self.inner.state();
            match (&state.tx, &state.root) {
                (Some(tx), Some(root)) => (tx.clone(), root.clone()),
                _ => return Err(Error::PoolClosed),
            }
        };

        let (reply, rx) = oneshot::channel();
        let request = Request {
            ctx: ctx.clone(),
            exec,
            reply,
        };

        match tx.try_send(request) {
            Ok(()) => {
                self.ensure_worker();
            }
            Err(TrySendError::Closed(_)) => return Err(Error::PoolClosed),
            Err(TrySendError::Full(request)) => {
                if !self.grow() {
                    tracing::debug!(running = self.running(), "pool saturated, waiting for room");
                }
                tokio::select! {
                    res = tx.send(request) => res.map_err(|_| Error::PoolClosed)?,
                    _ = root.cancelled() => return Err(Error::PoolClosed),
                    _ = ctx.cancelled() => return Err(ctx.err().unwrap_or(Error::Canceled)),
                }
            }
        }
        Ok(Submission { rx })
    }

    /// Submits the fixed executor with `args` attached to the context.
    ///
    /// # Panics
    /// Panics if the pool was created without a fixed executor; see
    /// [`try_execute`](Self::try_execute).
    pub async fn execute(&self, ctx: &Context, args: Arguments) -> Result<Submission, Error> {
        let Some(exec) = self.inner.fixed.clone() else {
            panic!("Pool::execute called on a pool without a fixed executor");
        };
        self.go(ctx.with_arguments(args), exec).await
    }

    /// Like [`execute`](Self::execute), but returns [`Error::NoExecutor`] instead of panicking.
    pub async fn try_execute(&self, ctx: &Context, args: Arguments) -> Result<Submission, Error> {
        let exec = self.inner.fixed.clone().ok_or(Error::NoExecutor)?;
        self.go(ctx.with_arguments(args), exec).await
    }

    /// Adds a worker unless the live count reached the cap.
    fn grow(&self) -> bool {
        let mut state = self.inner.state();
        if state.tx.is_none() {
            return false;
        }
        self.inner.spawn_worker(&mut state)
    }

    /// Makes sure a queued request has someone to pick it up.
    ///
    /// At the cap, the request is picked up once a previous generation's worker exits.
    fn ensure_worker(&self) {
        let mut state = self.inner.state();
        if state.serving == 0 && state.tx.is_some() {
            self.inner.spawn_worker(&mut state);
        }
    }
}

/// Pending result of a submitted job.
///
/// Resolves to the job's result, or [`Error::PoolClosed`] if the request was discarded
/// without running (pool closed or shut down). Dropping it does not affect the job.
#[derive(Debug)]
pub struct Submission {
    rx: oneshot::Receiver<Result<(), Error>>,
}

impl Future for Submission {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(Error::PoolClosed)))
    }
}
