//! # Context: the handle threaded through every executor call.
//!
//! A [`Context`] is immutable. New attributes are added by deriving a new context; every
//! derived context shares the parent's cancellation (a [`CancellationToken`] child) and can be
//! cancelled on its own without affecting the parent.
//!
//! ## Deadlines
//! A deadline is stored, not scheduled: [`Context::cancelled`] races the token against
//! `sleep_until(deadline)`, and [`Context::err`] reports [`Error::DeadlineExceeded`] once the
//! instant has passed. Deriving with a later deadline never extends the parent's.
//!
//! ## Tracked spawning
//! [`Context::spawn`] registers with the attached [`Tracker`] *before* spawning and releases
//! the registration on every exit path of the spawned task (including unwinding).
//! Without a tracker it is a plain `tokio::spawn`.

use std::fmt;
use std::future::Future;
use std::sync::Weak;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::context::{Arguments, Tracker};
use crate::core::{Handle, Shared};
use crate::error::Error;
use crate::executors::ExecutorRef;

/// Cancellable, attribute-carrying run scope.
#[derive(Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    tracker: Option<Tracker>,
    arguments: Option<Arguments>,
    retry: u32,
    repeat: u64,
    fire_time: Option<DateTime<Local>>,
    routine: Option<Weak<Shared>>,
}

impl Context {
    /// Creates a root context with a fresh cancellation token and no attributes.
    pub fn new() -> Self {
        Self::from_token(CancellationToken::new())
    }

    /// Creates a root context driven by an existing token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
            tracker: None,
            arguments: None,
            retry: 0,
            repeat: 0,
            fire_time: None,
            routine: None,
        }
    }

    // ---- derivation ----

    /// Derives a context that can be cancelled independently of its parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            ..self.clone()
        }
    }

    /// Derives a cancellable child bounded by `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a cancellable child bounded by `deadline` (or the parent's, if earlier).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut ctx = self.child();
        ctx.deadline = Some(match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        });
        ctx
    }

    /// Attaches a fresh join barrier.
    pub fn with_tracker(&self) -> Self {
        self.with_tracker_of(Tracker::new())
    }

    /// Attaches an existing join barrier.
    pub fn with_tracker_of(&self, tracker: Tracker) -> Self {
        Self {
            tracker: Some(tracker),
            ..self.clone()
        }
    }

    /// Attaches caller arguments (replacing inherited ones).
    pub fn with_arguments(&self, arguments: Arguments) -> Self {
        Self {
            arguments: Some(arguments),
            ..self.clone()
        }
    }

    /// Sets the 1-based retry attempt number.
    pub fn with_retry(&self, attempt: u32) -> Self {
        Self {
            retry: attempt,
            ..self.clone()
        }
    }

    /// Sets the 1-based repeat index.
    pub fn with_repeat(&self, index: u64) -> Self {
        Self {
            repeat: index,
            ..self.clone()
        }
    }

    /// Sets the scheduled fire time of a cron-driven invocation.
    pub fn with_fire_time(&self, at: DateTime<Local>) -> Self {
        Self {
            fire_time: Some(at),
            ..self.clone()
        }
    }

    pub(crate) fn with_routine(&self, shared: Weak<Shared>) -> Self {
        Self {
            routine: Some(shared),
            ..self.clone()
        }
    }

    // ---- cancellation ----

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline_passed()
    }

    /// Completes when the context is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Returns the cancellation cause, or `None` while the context is live.
    pub fn err(&self) -> Option<Error> {
        if self.deadline_passed() {
            Some(Error::DeadlineExceeded)
        } else if self.token.is_cancelled() {
            Some(Error::Canceled)
        } else {
            None
        }
    }

    /// Returns the effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns a token cancelled together with this context (not with its deadline).
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    // ---- attributes ----

    /// Caller arguments, if any were attached.
    pub fn arguments(&self) -> Option<&Arguments> {
        self.arguments.as_ref()
    }

    /// Attached join barrier, if any.
    pub fn tracker(&self) -> Option<&Tracker> {
        self.tracker.as_ref()
    }

    /// Current retry attempt (1-based); `0` outside a [`Retry`](crate::Retry).
    pub fn retry(&self) -> u32 {
        self.retry
    }

    /// Current repeat index (1-based); `0` outside a [`Repeat`](crate::Repeat).
    pub fn repeat(&self) -> u64 {
        self.repeat
    }

    /// Scheduled fire time of a cron-driven invocation.
    pub fn fire_time(&self) -> Option<DateTime<Local>> {
        self.fire_time
    }

    /// Handle to the supervising routine, if it is still alive.
    pub fn routine(&self) -> Option<Handle> {
        self.routine
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Handle::from_shared)
    }

    // ---- tracking ----

    /// Registers `n` units on the attached tracker (no-op without one).
    pub fn add(&self, n: usize) {
        if let Some(t) = &self.tracker {
            t.add(n);
        }
    }

    /// Deregisters one unit on the attached tracker (no-op without one).
    pub fn done(&self) {
        if let Some(t) = &self.tracker {
            t.done();
        }
    }

    /// Waits for the attached tracker to drain (returns immediately without one).
    pub async fn join(&self) {
        if let Some(t) = &self.tracker {
            t.join().await;
        }
    }

    /// Spawns `fut` as a tracked task.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.tracker.as_ref().map(Tracker::guard);
        tokio::spawn(async move {
            let _guard = guard;
            fut.await
        })
    }

    /// Spawns `exec` under this context as a tracked task.
    pub fn go(&self, exec: ExecutorRef) -> JoinHandle<Result<(), Error>> {
        let ctx = self.clone();
        self.spawn(async move { exec.execute(ctx).await })
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .field("tracked", &self.tracker.is_some())
            .field("arguments", &self.arguments)
            .field("retry", &self.retry)
            .field("repeat", &self.repeat)
            .field("fire_time", &self.fire_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutorFn, args};

    #[tokio::test]
    async fn child_cancellation_does_not_reach_parent() {
        let parent = Context::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
        assert!(matches!(child.err(), Some(Error::Canceled)));
        assert!(parent.err().is_none());
    }

    #[tokio::test]
    async fn parent_cancellation_reaches_every_descendant() {
        let parent = Context::new();
        let grandchild = parent.child().with_retry(2).child();
        parent.cancel();
        grandchild.cancelled().await;
        assert!(grandchild.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_and_reports_exceeded() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));
        assert!(ctx.err().is_none());
        ctx.cancelled().await;
        assert!(matches!(ctx.err(), Some(Error::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn later_deadline_never_extends_parent() {
        let parent = Context::new().with_timeout(Duration::from_millis(10));
        let child = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn attributes_are_inherited_by_derived_contexts() {
        let ctx = Context::new()
            .with_arguments(args![1u8, "two"])
            .with_retry(3)
            .with_repeat(4);
        let derived = ctx.child().with_tracker();
        assert_eq!(derived.retry(), 3);
        assert_eq!(derived.repeat(), 4);
        assert_eq!(derived.arguments().map(Arguments::len), Some(2));
        assert!(ctx.tracker().is_none());
        assert!(derived.tracker().is_some());
        assert!(derived.routine().is_none());
    }

    #[tokio::test]
    async fn tracking_without_tracker_is_a_no_op() {
        let ctx = Context::new();
        ctx.add(3);
        ctx.done();
        ctx.join().await;
        let res = ctx
            .go(ExecutorFn::arc(|_ctx| async { Ok(()) }))
            .await
            .unwrap();
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn go_is_tracked_until_completion() {
        let ctx = Context::new().with_tracker();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = std::sync::Mutex::new(Some(rx));
        let exec = ExecutorFn::arc(move |_ctx| {
            let rx = rx.lock().unwrap().take();
            async move {
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                Ok(())
            }
        });
        let handle = ctx.go(exec);
        assert_eq!(ctx.tracker().map(Tracker::in_flight), Some(1));
        tx.send(()).unwrap();
        ctx.join().await;
        assert!(handle.await.unwrap().is_ok());
    }
}
