//! # Fan-out decorators.
//!
//! - [`Concurrent`] runs *one* executor `n` times at once.
//! - [`Parallel`] runs *several* executors once each, at once.
//!
//! Every instance is spawned as a tracked task on the caller's context and the decorator
//! waits for all of them. Individual failures are logged at `warn` and do not fail the
//! decorator. A panic in any instance is re-raised after the remaining instances finished.

use std::panic;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::context::Context;
use crate::error::Error;
use crate::executors::{Executor, ExecutorRef, into_ref};

/// Runs one executor `n` times concurrently.
pub struct Concurrent {
    n: usize,
    exec: ExecutorRef,
}

impl Concurrent {
    /// Wraps `exec`; `n == 0` runs nothing.
    pub fn new(n: usize, exec: impl Executor) -> Self {
        Self {
            n,
            exec: into_ref(exec),
        }
    }
}

#[async_trait]
impl Executor for Concurrent {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        let handles = (0..self.n).map(|_| ctx.go(self.exec.clone())).collect();
        join_all("concurrent", handles).await;
        Ok(())
    }
}

/// Runs several executors concurrently, once each.
pub struct Parallel {
    execs: Vec<ExecutorRef>,
}

impl Parallel {
    /// Wraps `execs`.
    pub fn new(execs: impl IntoIterator<Item = ExecutorRef>) -> Self {
        Self {
            execs: execs.into_iter().collect(),
        }
    }

    /// Adds one more executor to the set.
    pub fn with(mut self, exec: impl Executor) -> Self {
        self.execs.push(into_ref(exec));
        self
    }
}

#[async_trait]
impl Executor for Parallel {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        let handles = self.execs.iter().map(|e| ctx.go(e.clone())).collect();
        join_all("parallel", handles).await;
        Ok(())
    }
}

async fn join_all(kind: &'static str, handles: Vec<JoinHandle<Result<(), Error>>>) {
    let mut panicked = None;
    for (index, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(kind, index, error = %err, "fan-out instance failed");
            }
            Err(join) if join.is_panic() => {
                if panicked.is_none() {
                    panicked = Some(join.into_panic());
                }
            }
            Err(join) => {
                tracing::warn!(kind, index, error = %join, "fan-out instance aborted");
            }
        }
    }
    if let Some(payload) = panicked {
        panic::resume_unwind(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutorFn;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;

    #[tokio::test]
    async fn concurrent_instances_overlap() {
        let barrier = Arc::new(Barrier::new(3));
        let b = barrier.clone();
        let exec = Concurrent::new(
            3,
            ExecutorFn::new(move |_ctx: Context| {
                let b = b.clone();
                async move {
                    // completes only if all three run at the same time
                    b.wait().await;
                    Ok(())
                }
            }),
        );
        tokio::time::timeout(Duration::from_secs(5), exec.execute(Context::new()))
            .await
            .expect("instances did not overlap")
            .unwrap();
    }

    #[tokio::test]
    async fn failures_are_absorbed() {
        let ran = Arc::new(AtomicUsize::new(0));
        let r1 = ran.clone();
        let r2 = ran.clone();
        let exec = Parallel::new([])
            .with(ExecutorFn::new(move |_ctx: Context| {
                let r = r1.clone();
                async move {
                    r.fetch_add(1, Ordering::SeqCst);
                    Err(Error::failed("one"))
                }
            }))
            .with(ExecutorFn::new(move |_ctx: Context| {
                let r = r2.clone();
                async move {
                    r.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }));
        assert!(exec.execute(Context::new()).await.is_ok());
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn instances_are_tracked_on_the_caller_context() {
        let ctx = Context::new().with_tracker();
        let exec = Concurrent::new(4, ExecutorFn::new(|_ctx: Context| async { Ok(()) }));
        exec.execute(ctx.clone()).await.unwrap();
        assert_eq!(ctx.tracker().map(|t| t.in_flight()), Some(0));
    }

    #[tokio::test]
    async fn panic_is_reraised_after_all_finish() {
        let finished = Arc::new(AtomicUsize::new(0));
        let f = finished.clone();
        let exec = Parallel::new([])
            .with(ExecutorFn::new(|_ctx: Context| async { panic!("instance blew up") }))
            .with(ExecutorFn::new(move |_ctx: Context| {
                let f = f.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    f.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }));
        let outcome = tokio::spawn(async move { exec.execute(Context::new()).await }).await;
        assert!(outcome.unwrap_err().is_panic());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
