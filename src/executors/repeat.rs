//! Repeat decorator.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time;

use crate::context::Context;
use crate::error::Error;
use crate::executors::{Executor, ExecutorRef, into_ref};

/// Invokes the wrapped executor `times` times (or until cancelled when `times == 0`),
/// sleeping `interval` between invocations.
///
/// The 1-based iteration index is visible through [`Context::repeat`]. The first failing
/// iteration ends the loop and its error is annotated with `repeat <index>`. Cancellation
/// between iterations (including during the sleep) returns the context error.
pub struct Repeat {
    times: u64,
    interval: Duration,
    exec: ExecutorRef,
}

impl Repeat {
    /// Wraps `exec`; `times == 0` repeats until the context is cancelled.
    pub fn new(times: u64, interval: Duration, exec: impl Executor) -> Self {
        Self {
            times,
            interval,
            exec: into_ref(exec),
        }
    }

    /// Repeats until the context is cancelled.
    pub fn forever(interval: Duration, exec: impl Executor) -> Self {
        Self::new(0, interval, exec)
    }

    fn exhausted(&self, index: u64) -> bool {
        self.times > 0 && index >= self.times
    }
}

#[async_trait]
impl Executor for Repeat {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        let mut index = 1;
        loop {
            self.exec
                .execute(ctx.with_repeat(index))
                .await
                .map_err(|err| err.annotate(format!("repeat {index}")))?;

            if self.exhausted(index) {
                return Ok(());
            }
            if !self.interval.is_zero() {
                tokio::select! {
                    _ = time::sleep(self.interval) => {}
                    _ = ctx.cancelled() => {}
                }
            }
            if let Some(err) = ctx.err() {
                return Err(err);
            }
            index += 1;
        }
    }
}
