//! # Routine: a supervised run of one main executor.
//!
//! A [`Routine`] owns the lifecycle around its main executor: prepare, a cancellable tracked
//! run scope, optional child executors, OS signal handling, the join barrier and cleanup.
//!
//! ## Flow
//! ```text
//! execute(ctx)
//!   ├─► prepare(base ctx)            ── error ──► return it (no cleanup)
//!   ├─► run ctx = child + tracker + routine handle
//!   ├─► spawn main + children (tracked)
//!   ├─► select! {
//!   │     main finished      → main's result
//!   │     Handle::stop()     → Ok
//!   │     ctx done           → Canceled / DeadlineExceeded
//!   │     signal terminates  → Interrupted { signal }
//!   │   }
//!   ├─► cancel run ctx, join every tracked task
//!   ├─► cleanup(base ctx)            ── error ──► logged only
//!   └─► result (a panic in main or a child is re-raised here)
//! ```
//!
//! The first ready cause wins; there is no priority between them.
//!
//! ## Example
//! ```rust,no_run
//! use routine::{Context, ExecutorFn, Routine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), routine::Error> {
//!     let main = ExecutorFn::new(|ctx: Context| async move {
//!         ctx.cancelled().await;
//!         Ok(())
//!     });
//!     Routine::builder(main)
//!         .with_default_interrupts()
//!         .build()
//!         .execute(Context::new())
//!         .await
//! }
//! ```

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::{JoinError, JoinHandle};

use crate::{
    context::{Context, Tracker},
    error::Error,
    events::{Event, EventKind},
    executors::{Executor, ExecutorRef, panic_message},
    signals::{Interrupt, InterruptHandler, Signal, SignalSet},
    subscribers::{Subscribe, SubscriberSet},
};

use super::builder::{Options, RoutineBuilder};
use super::handle::{Handle, Shared, State};

type Panic = Box<dyn Any + Send + 'static>;

/// Why the serving phase ended.
enum Exit {
    Main(Result<Result<(), Error>, JoinError>),
    Stop,
    Done(Error),
    Signal(Signal),
}

/// Outcome of the serving phase, before cleanup.
struct Outcome {
    result: Result<(), Error>,
    panic: Option<Panic>,
}

impl Outcome {
    fn failed(err: Error) -> Self {
        Self {
            result: Err(err),
            panic: None,
        }
    }
}

/// Per-run trace fan-out; a no-op without sinks.
struct Trace(Option<SubscriberSet>);

impl Trace {
    fn new(sinks: &[Arc<dyn Subscribe>]) -> Self {
        Self((!sinks.is_empty()).then(|| SubscriberSet::new(sinks.to_vec())))
    }

    fn emit(&self, make: impl FnOnce() -> Event) {
        if let Some(set) = &self.0 {
            set.emit(make());
        }
    }

    async fn shutdown(self) {
        if let Some(set) = self.0 {
            set.shutdown().await;
        }
    }
}

/// Supervised run of a main executor with prepare/cleanup hooks, children and signals.
///
/// Build one with [`Routine::builder`]. A routine can be executed again once a run is over;
/// each run gets a fresh stop signal, tracker and trace workers.
pub struct Routine {
    exec: ExecutorRef,
    opts: Options,
    shared: Arc<Shared>,
}

impl Routine {
    /// Starts building a routine around `exec`.
    pub fn builder(exec: impl Executor) -> RoutineBuilder {
        RoutineBuilder::new(exec)
    }

    /// Creates a routine with no options.
    pub fn new(exec: impl Executor) -> Self {
        Self::builder(exec).build()
    }

    pub(crate) fn new_internal(exec: ExecutorRef, opts: Options) -> Self {
        Self {
            exec,
            opts,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Returns a control handle (clonable, usable from other tasks).
    pub fn handle(&self) -> Handle {
        Handle::from_shared(Arc::clone(&self.shared))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.shared.state()
    }

    /// Runs the routine to completion.
    ///
    /// Returns the main executor's result, `Ok` after [`Handle::stop`], the context's
    /// cancellation cause, or [`Error::Interrupted`], whichever comes first. Returns
    /// [`Error::AlreadyRunning`] immediately if a run is in progress.
    pub async fn execute(&self, ctx: Context) -> Result<(), Error> {
        let Some(entered) = self.shared.enter() else {
            return Err(Error::AlreadyRunning);
        };
        let trace = Trace::new(&self.opts.sinks);
        trace.emit(|| Event::new(EventKind::RoutineStarting));

        let base = match &self.opts.arguments {
            Some(arguments) => ctx.with_arguments(arguments.clone()),
            None => ctx,
        };

        if let Some(prepare) = &self.opts.prepare {
            if let Err(err) = prepare.execute(base.clone()).await {
                tracing::warn!(error = %err, "routine prepare failed");
                trace.emit(|| Event::new(EventKind::PrepareFailed).with_error(&err));
                trace.emit(|| Event::new(EventKind::RoutineStopped).with_error(&err));
                trace.shutdown().await;
                drop(entered);
                return Err(err);
            }
        }

        let outcome = self.serve(&base, entered.stop_token(), &trace).await;

        if let Some(cleanup) = &self.opts.cleanup {
            if let Err(err) = cleanup.execute(base.clone()).await {
                tracing::warn!(error = %err, "routine cleanup failed");
                trace.emit(|| Event::new(EventKind::CleanupFailed).with_error(&err));
            }
        }

        let Outcome { result, panic } = outcome;
        trace.emit(|| {
            let ev = Event::new(EventKind::RoutineStopped);
            match &result {
                Ok(()) => ev,
                Err(err) => ev.with_error(err),
            }
        });
        trace.shutdown().await;
        drop(entered);
        tracing::debug!(ok = result.is_ok(), "routine stopped");

        if let Some(panic) = panic {
            std::panic::resume_unwind(panic);
        }
        result
    }

    async fn serve(
        &self,
        base: &Context,
        stop: &tokio_util::sync::CancellationToken,
        trace: &Trace,
    ) -> Outcome {
        let tracker = Tracker::new();
        let ctx = base
            .child()
            .with_tracker_of(tracker.clone())
            .with_routine(Arc::downgrade(&self.shared));

        let handlers: Vec<(Signal, InterruptHandler)> = self
            .opts
            .interrupts
            .iter()
            .map(|i| (i.signal(), i.interrupt()))
            .collect();
        let mut signals = match SignalSet::new(handlers.iter().map(|(sig, _)| *sig)) {
            Ok(signals) => signals,
            Err(err) => {
                tracing::warn!(error = %err, "routine signal registration failed");
                return Outcome::failed(err.into());
            }
        };

        self.shared.attach(&ctx);
        let mut main = ctx.go(Arc::clone(&self.exec));
        let children: Vec<JoinHandle<Result<(), Error>>> = self
            .opts
            .children
            .iter()
            .enumerate()
            .map(|(index, child)| {
                let child = Arc::clone(child);
                let child_ctx = ctx.clone();
                ctx.spawn(async move {
                    let res = child.execute(child_ctx).await;
                    if let Err(err) = &res {
                        tracing::warn!(child = index, error = %err, "routine child failed");
                    }
                    res
                })
            })
            .collect();

        self.shared.serve();
        trace.emit(|| Event::new(EventKind::RoutineServing));
        tracing::debug!(
            children = children.len(),
            signals = signals.signals().len(),
            "routine serving"
        );

        let exit = loop {
            tokio::select! {
                joined = &mut main => break Exit::Main(joined),
                _ = stop.cancelled() => break Exit::Stop,
                _ = ctx.cancelled() => break Exit::Done(ctx.err().unwrap_or(Error::Canceled)),
                Some(sig) = signals.recv() => {
                    if dispatch(sig, &ctx, &handlers) == Interrupt::Terminate {
                        break Exit::Signal(sig);
                    }
                    tracing::debug!(signal = %sig, "routine signal ignored");
                    trace.emit(|| Event::new(EventKind::SignalIgnored).with_signal(sig));
                }
            }
        };

        self.shared.stopping();
        let mut panic = None;
        let mut main_done = false;
        let result = match exit {
            Exit::Main(joined) => {
                main_done = true;
                let res = settle(joined, &mut panic);
                trace.emit(|| {
                    let ev = Event::new(EventKind::MainExited);
                    match &res {
                        Ok(()) => ev,
                        Err(err) => ev.with_error(err),
                    }
                });
                res
            }
            Exit::Stop => {
                trace.emit(|| Event::new(EventKind::StopRequested));
                Ok(())
            }
            Exit::Done(err) => {
                trace.emit(|| Event::new(EventKind::ContextDone).with_error(&err));
                Err(err)
            }
            Exit::Signal(signal) => {
                tracing::info!(signal = %signal, "routine interrupted");
                trace.emit(|| Event::new(EventKind::SignalReceived).with_signal(signal));
                Err(Error::Interrupted { signal })
            }
        };

        ctx.cancel();
        drop(signals);
        tracker.join().await;
        trace.emit(|| Event::new(EventKind::AllJoined));

        if !main_done {
            let _ = settle(main.await, &mut panic);
        }
        for (index, child) in children.into_iter().enumerate() {
            if let Err(err) = settle(child.await, &mut panic) {
                trace.emit(|| {
                    Event::new(EventKind::ChildFailed)
                        .with_child(index)
                        .with_error(&err)
                });
            }
        }

        Outcome { result, panic }
    }
}

/// Runs every handler registered for `sig`; terminates if any of them says so.
fn dispatch(sig: Signal, ctx: &Context, handlers: &[(Signal, InterruptHandler)]) -> Interrupt {
    let mut decision = Interrupt::Continue;
    for (_, handler) in handlers.iter().filter(|(s, _)| *s == sig) {
        if handler(ctx) == Interrupt::Terminate {
            decision = Interrupt::Terminate;
        }
    }
    decision
}

/// Flattens a join result; the first panic is kept for re-raising.
fn settle(
    joined: Result<Result<(), Error>, JoinError>,
    panic: &mut Option<Panic>,
) -> Result<(), Error> {
    match joined {
        Ok(res) => res,
        Err(err) if err.is_panic() => {
            let payload = err.into_panic();
            let msg = panic_message(&*payload);
            tracing::error!(info = %msg, "routine task panicked");
            panic.get_or_insert(payload);
            Err(Error::Panicked(msg))
        }
        Err(_) => Err(Error::Canceled),
    }
}

#[async_trait]
impl Executor for Routine {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        Routine::execute(self, ctx).await
    }
}

impl std::fmt::Debug for Routine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routine")
            .field("state", &self.state())
            .field("children", &self.opts.children.len())
            .field("interrupts", &self.opts.interrupts.len())
            .field("sinks", &self.opts.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::{ExecutorFn, args};

    fn waiting() -> ExecutorRef {
        ExecutorFn::arc(|ctx: Context| async move {
            ctx.cancelled().await;
            Ok(())
        })
    }

    struct Collect(Arc<Mutex<Vec<EventKind>>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.kind);
        }
    }

    #[tokio::test]
    async fn prepare_flag_is_visible_to_main_and_cleanup() {
        let flag = Arc::new(AtomicBool::new(false));
        let checked = Arc::new(AtomicBool::new(false));

        let f = flag.clone();
        let prepare = ExecutorFn::new(move |_ctx| {
            let f = f.clone();
            async move {
                f.store(true, Ordering::SeqCst);
                Ok(())
            }
        });
        let f = flag.clone();
        let main = ExecutorFn::new(move |_ctx| {
            let f = f.clone();
            async move {
                if f.load(Ordering::SeqCst) {
                    Ok(())
                } else {
                    Err(Error::failed("prepare did not run"))
                }
            }
        });
        let (f, c) = (flag.clone(), checked.clone());
        let cleanup = ExecutorFn::new(move |_ctx| {
            let (f, c) = (f.clone(), c.clone());
            async move {
                c.store(f.load(Ordering::SeqCst), Ordering::SeqCst);
                Ok(())
            }
        });

        let routine = Routine::builder(main)
            .prepare(prepare)
            .cleanup(cleanup)
            .build();
        assert!(routine.execute(Context::new()).await.is_ok());
        assert!(checked.load(Ordering::SeqCst));
        assert_eq!(routine.state(), State::Stopped);
    }

    #[tokio::test]
    async fn main_error_is_returned_and_cleanup_runs_once() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let c = cleanups.clone();
        let routine = Routine::builder(ExecutorFn::new(|_ctx| async {
            Err(Error::failed("main"))
        }))
        .prepare(ExecutorFn::new(|_ctx| async { Ok(()) }))
        .cleanup(ExecutorFn::new(move |_ctx| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(Error::failed("cleanup"))
            }
        }))
        .build();

        let err = routine.execute(Context::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "execution failed: main");
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn prepare_failure_skips_main_and_cleanup() {
        let touched = Arc::new(AtomicUsize::new(0));
        let (m, c) = (touched.clone(), touched.clone());
        let routine = Routine::builder(ExecutorFn::new(move |_ctx| {
            let m = m.clone();
            async move {
                m.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
        .prepare(ExecutorFn::new(|_ctx| async { Err(Error::failed("prepare")) }))
        .cleanup(ExecutorFn::new(move |_ctx| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
        .build();

        let err = routine.execute(Context::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "execution failed: prepare");
        assert_eq!(touched.load(Ordering::SeqCst), 0);
        assert_eq!(routine.state(), State::Stopped);
    }

    #[tokio::test]
    async fn stop_ends_the_run_and_joins_children() {
        let joined = Arc::new(AtomicUsize::new(0));
        let j = joined.clone();
        let routine = Arc::new(
            Routine::builder(waiting())
                .go(ExecutorFn::new(move |ctx: Context| {
                    let j = j.clone();
                    async move {
                        ctx.cancelled().await;
                        j.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }))
                .build(),
        );
        let handle = routine.handle();
        let run = {
            let routine = routine.clone();
            tokio::spawn(async move { routine.execute(Context::new()).await })
        };

        handle.serving().await;
        assert_eq!(handle.state(), State::Running);
        handle.stop();
        assert!(run.await.unwrap().is_ok());
        assert_eq!(joined.load(Ordering::SeqCst), 1);
        handle.stopped().await;
        assert_eq!(handle.state(), State::Stopped);
    }

    #[tokio::test]
    async fn second_execute_while_running_is_rejected() {
        let routine = Arc::new(Routine::new(waiting()));
        let handle = routine.handle();
        let run = {
            let routine = routine.clone();
            tokio::spawn(async move { routine.execute(Context::new()).await })
        };
        handle.serving().await;

        let again = routine.execute(Context::new()).await;
        assert!(matches!(again, Err(Error::AlreadyRunning)));

        handle.stop();
        assert!(run.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn arguments_reach_every_phase() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counts_args = |seen: Arc<AtomicUsize>| {
            ExecutorFn::new(move |ctx: Context| {
                let seen = seen.clone();
                async move {
                    if ctx.arguments().and_then(|a| a.get::<&str>(0)) == Some(&"cfg") {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(())
                }
            })
        };
        let routine = Routine::builder(counts_args(seen.clone()))
            .arguments(args!["cfg"])
            .prepare(counts_args(seen.clone()))
            .cleanup(counts_args(seen.clone()))
            .build();
        assert!(routine.execute(Context::new()).await.is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_deadline_ends_the_run() {
        let routine = Routine::new(ExecutorFn::new(|ctx: Context| async move {
            ctx.cancelled().await;
            Err(ctx.err().unwrap_or(Error::Canceled))
        }));
        let ctx = Context::new().with_timeout(Duration::from_millis(20));
        let err = routine.execute(ctx).await.unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
    }

    #[tokio::test]
    async fn handle_go_spawns_tracked_children() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let s = spawned.clone();
        let main = ExecutorFn::new(move |ctx: Context| {
            let s = s.clone();
            async move {
                let handle = ctx.routine().ok_or(Error::NoContext)?;
                for _ in 0..3 {
                    let s = s.clone();
                    handle.go(ExecutorFn::arc(move |ctx: Context| {
                        let s = s.clone();
                        async move {
                            ctx.cancelled().await;
                            s.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    }))?;
                }
                Ok(())
            }
        });
        let routine = Routine::new(main);
        assert!(matches!(routine.handle().go(waiting()), Err(Error::NoContext)));
        assert!(routine.execute(Context::new()).await.is_ok());
        assert_eq!(spawned.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn go_is_refused_once_shutdown_begins() {
        let refused = Arc::new(AtomicBool::new(false));
        let r = refused.clone();
        let main = ExecutorFn::new(move |ctx: Context| {
            let r = r.clone();
            async move {
                let handle = ctx.routine().ok_or(Error::NoContext)?;
                handle.stop();
                ctx.cancelled().await;
                let late = handle.go(ExecutorFn::arc(|_ctx| async { Ok(()) }));
                r.store(matches!(late, Err(Error::NoContext)), Ordering::SeqCst);
                Ok(())
            }
        });
        let routine = Routine::new(main);
        assert!(routine.execute(Context::new()).await.is_ok());
        assert!(refused.load(Ordering::SeqCst));
    }

    #[cfg(unix)]
    async fn raise(name: &str) {
        let status = tokio::process::Command::new("kill")
            .arg(format!("-{name}"))
            .arg(std::process::id().to_string())
            .status()
            .await
            .unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn delivered_signals_trap_or_interrupt_the_run() {
        use tokio::signal::unix::SignalKind;

        let usr1 = Signal::from_raw(SignalKind::user_defined1().as_raw_value());
        let usr2 = Signal::from_raw(SignalKind::user_defined2().as_raw_value());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let routine = Arc::new(
            Routine::builder(waiting())
                .signal(usr1, move || {
                    h.fetch_add(1, Ordering::SeqCst);
                })
                .cancel_signals([usr2])
                .build(),
        );
        let handle = routine.handle();
        let run = {
            let routine = routine.clone();
            tokio::spawn(async move { routine.execute(Context::new()).await })
        };
        handle.serving().await;

        // a trap runs its callback and the run keeps serving
        raise("USR1").await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while hits.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(handle.state(), State::Running);

        // a cancel signal ends the run with a signal-derived exit code
        raise("USR2").await;
        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Interrupted { signal } if signal == usr2));
        assert_eq!(err.code().value(), 128 + usr2.as_raw());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn routine_runs_again_after_stopping() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        let routine = Routine::new(ExecutorFn::new(move |_ctx| {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));
        assert!(routine.execute(Context::new()).await.is_ok());
        assert!(routine.execute(Context::new()).await.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn child_failure_is_traced_not_returned() {
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let routine = Routine::builder(ExecutorFn::new(|_ctx| async {
            tokio::task::yield_now().await;
            Ok(())
        }))
        .go(ExecutorFn::new(|_ctx| async { Err(Error::failed("child")) }))
        .trace(Arc::new(Collect(kinds.clone())))
        .build();

        assert!(routine.execute(Context::new()).await.is_ok());
        let kinds = kinds.lock().unwrap().clone();
        assert_eq!(kinds.first(), Some(&EventKind::RoutineStarting));
        assert_eq!(kinds.last(), Some(&EventKind::RoutineStopped));
        assert!(kinds.contains(&EventKind::ChildFailed));
        assert!(kinds.contains(&EventKind::AllJoined));
    }

    #[tokio::test]
    #[should_panic(expected = "main exploded")]
    async fn main_panic_is_reraised_after_cleanup() {
        let routine = Routine::new(ExecutorFn::new(|_ctx| async {
            panic!("main exploded");
        }));
        let _ = routine.execute(Context::new()).await;
    }

    #[tokio::test]
    async fn routine_nests_as_an_executor() {
        let inner: ExecutorRef = Arc::new(Routine::new(ExecutorFn::new(|_ctx| async {
            Err(Error::failed("inner"))
        })));
        let outer = Routine::new(inner);
        let err = outer.execute(Context::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "execution failed: inner");
    }
}
