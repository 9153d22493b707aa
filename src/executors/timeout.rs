//! # Time-bounded execution.
//!
//! [`Timeout`] and [`Deadline`] derive a time-bounded child context, run the wrapped executor
//! under it and return as soon as either the executor finishes or the bound passes. When the
//! bound wins, the child context is cancelled and the executor is awaited until it observes
//! cancellation; the decorator then returns [`Error::DeadlineExceeded`] (or
//! [`Error::Canceled`] if the parent was cancelled first). Nothing is forcibly aborted.
//!
//! An executor that notices the bound on its own and exits with a cancellation error is
//! reported the same way. The derived context is released (cancelled) on every return path.

use async_trait::async_trait;
use tokio::time::{Duration, Instant};

use crate::context::Context;
use crate::error::Error;
use crate::executors::{Executor, ExecutorRef, into_ref};

/// Bounds the wrapped executor by a relative duration.
pub struct Timeout {
    timeout: Duration,
    exec: ExecutorRef,
}

impl Timeout {
    /// Wraps `exec`.
    pub fn new(timeout: Duration, exec: impl Executor) -> Self {
        Self {
            timeout,
            exec: into_ref(exec),
        }
    }
}

#[async_trait]
impl Executor for Timeout {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        bounded(&self.exec, ctx.with_timeout(self.timeout)).await
    }
}

/// Bounds the wrapped executor by an absolute instant.
pub struct Deadline {
    deadline: Instant,
    exec: ExecutorRef,
}

impl Deadline {
    /// Wraps `exec`.
    pub fn new(deadline: Instant, exec: impl Executor) -> Self {
        Self {
            deadline,
            exec: into_ref(exec),
        }
    }
}

#[async_trait]
impl Executor for Deadline {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        bounded(&self.exec, ctx.with_deadline(self.deadline)).await
    }
}

async fn bounded(exec: &ExecutorRef, ctx: Context) -> Result<(), Error> {
    let _release = ctx.token().clone().drop_guard();
    let mut fut = exec.execute(ctx.clone());

    tokio::select! {
        res = &mut fut => match res {
            Err(err) if err.is_cancellation() => Err(ctx.err().unwrap_or(err)),
            other => other,
        },
        _ = ctx.cancelled() => {
            let cause = ctx.err().unwrap_or(Error::Canceled);
            ctx.cancel();
            if let Err(err) = fut.await {
                tracing::debug!(error = %err, "bounded executor exited after cancellation");
            }
            Err(cause)
        }
    }
}
