//! Retry decorator.

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Error;
use crate::executors::{Executor, ExecutorRef, into_ref};

/// Invokes the wrapped executor up to `times` attempts, stopping at the first success.
///
/// The 1-based attempt number is visible to the wrapped executor through
/// [`Context::retry`]. Attempts stop early once the context is cancelled. The error of the
/// last attempt is returned unchanged.
pub struct Retry {
    times: u32,
    exec: ExecutorRef,
}

impl Retry {
    /// Wraps `exec`; `times == 0` is treated as a single attempt.
    pub fn new(times: u32, exec: impl Executor) -> Self {
        Self {
            times: times.max(1),
            exec: into_ref(exec),
        }
    }

    /// Maximum number of attempts.
    pub fn times(&self) -> u32 {
        self.times
    }
}

#[async_trait]
impl Executor for Retry {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        let mut attempt = 1;
        loop {
            match self.exec.execute(ctx.with_retry(attempt)).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt >= self.times || ctx.is_cancelled() => return Err(err),
                Err(err) => {
                    tracing::debug!(
                        attempt,
                        max = self.times,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutorFn;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing_until(ok_at: u32, calls: Arc<AtomicU32>) -> impl Executor {
        ExecutorFn::new(move |ctx: Context| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if ctx.retry() >= ok_at {
                    Ok(())
                } else {
                    Err(Error::failed(format!("attempt {}", ctx.retry())))
                }
            }
        })
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let r = Retry::new(5, failing_until(3, calls.clone()));
        assert!(r.execute(Context::new()).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_exhaustion() {
        let calls = Arc::new(AtomicU32::new(0));
        let r = Retry::new(2, failing_until(u32::MAX, calls.clone()));
        let err = r.execute(Context::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "execution failed: attempt 2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_means_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let r = Retry::new(0, failing_until(u32::MAX, calls.clone()));
        assert_eq!(r.times(), 1);
        assert!(r.execute(Context::new()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_context_stops_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let ctx = Context::new();
        ctx.cancel();
        let r = Retry::new(10, failing_until(u32::MAX, calls.clone()));
        assert!(r.execute(ctx).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
