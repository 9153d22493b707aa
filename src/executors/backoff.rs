//! # Backoff between retry attempts.
//!
//! [`Backoff`] is meant to sit *inside* a [`Retry`](crate::Retry): it reads the attempt number
//! from [`Context::retry`] and, for every attempt after the first, sleeps for the delay
//! computed by its [`BackoffPolicy`] before invoking the wrapped executor.
//!
//! The delay before attempt `n` (`n >= 2`) is `first × factor^(n-2)`, clamped to `max`, then
//! jitter is applied. Because the base delay is derived purely from the attempt number, jitter
//! output never feeds back into later delays.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use routine::{BackoffPolicy, JitterPolicy};
//!
//! let policy = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(policy.delay(1), Duration::ZERO);             // first attempt never waits
//! assert_eq!(policy.delay(2), Duration::from_millis(100)); // first retry
//! assert_eq!(policy.delay(3), Duration::from_millis(200));
//! assert_eq!(policy.delay(10), Duration::from_secs(1));    // capped
//! ```

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time;

use crate::context::Context;
use crate::error::Error;
use crate::executors::{Executor, ExecutorRef, into_ref};

/// Randomization applied to backoff delays.
///
/// - [`JitterPolicy::None`]: exact delay.
/// - [`JitterPolicy::Full`]: random delay in `[0, delay]`.
/// - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter.
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// Half the delay plus a random half.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        if ms == 0 {
            return delay;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + rand::rng().random_range(0..=ms - half))
            }
        }
    }
}

/// Delay growth between retry attempts.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound of any delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization of the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `max = 30s`, `factor = 2.0`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait before attempt `attempt` (1-based); zero for the first attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

/// Sleeps according to a [`BackoffPolicy`] before every retried attempt.
pub struct Backoff {
    policy: BackoffPolicy,
    exec: ExecutorRef,
}

impl Backoff {
    /// Wraps `exec`.
    pub fn new(policy: BackoffPolicy, exec: impl Executor) -> Self {
        Self {
            policy,
            exec: into_ref(exec),
        }
    }
}

#[async_trait]
impl Executor for Backoff {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        let delay = self.policy.delay(ctx.retry());
        if !delay.is_zero() {
            tracing::debug!(attempt = ctx.retry(), ?delay, "backing off");
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = ctx.cancelled() => return Err(ctx.err().unwrap_or(Error::Canceled)),
            }
        }
        self.exec.execute(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutorFn, Retry};
    use std::sync::{Arc, Mutex};

    fn policy(factor: f64, jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor,
            jitter,
        }
    }

    #[test]
    fn exponential_growth_without_jitter() {
        let p = policy(2.0, JitterPolicy::None);
        assert_eq!(p.delay(0), Duration::ZERO);
        assert_eq!(p.delay(2), Duration::from_millis(100));
        assert_eq!(p.delay(3), Duration::from_millis(200));
        assert_eq!(p.delay(4), Duration::from_millis(400));
        assert_eq!(p.delay(6), Duration::from_millis(1600));
    }

    #[test]
    fn overflow_clamps_to_max() {
        let p = policy(2.0, JitterPolicy::None);
        assert_eq!(p.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let full = policy(1.0, JitterPolicy::Full);
        let equal = policy(1.0, JitterPolicy::Equal);
        for attempt in 2..50 {
            assert!(full.delay(attempt) <= Duration::from_millis(100));
            let d = equal.delay(attempt);
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_retries() {
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let rec = stamps.clone();
        let start = time::Instant::now();
        let leaf = ExecutorFn::new(move |_ctx: Context| {
            let rec = rec.clone();
            async move {
                rec.lock().unwrap().push(start.elapsed());
                Err(Error::failed("nope"))
            }
        });
        let exec = Retry::new(3, Backoff::new(policy(2.0, JitterPolicy::None), leaf));
        assert!(exec.execute(Context::new()).await.is_err());
        assert_eq!(
            *stamps.lock().unwrap(),
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(300)
            ]
        );
    }
}
