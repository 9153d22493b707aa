//! # Pool configuration.
//!
//! Provides [`PoolConfig`], the sizing knobs of a [`Pool`](crate::Pool).
//!
//! ## Sentinel values
//! - `max_concurrency = 0` → unbounded worker growth
//! - `clear_duration = 0s` → idle workers are never retired
//! - `waiting_size = 0` → treated as 1 (a bounded queue needs a positive capacity)

use std::time::Duration;

/// Sizing of a worker pool.
///
/// ## Field semantics
/// - `running_size`: workers started at `open` and the floor idle shrinking returns to
/// - `waiting_size`: capacity of the request queue
/// - `max_concurrency`: hard cap on live workers (`0` = unbounded)
/// - `clear_duration`: idle time after which a surplus worker retires (`0s` = never)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Workers started when the pool opens.
    pub running_size: usize,

    /// Capacity of the bounded request queue.
    pub waiting_size: usize,

    /// Maximum number of live workers.
    ///
    /// - `0` = unbounded
    /// - `n > 0` = at most `n` workers, ever
    pub max_concurrency: usize,

    /// Idle time after which a worker above `running_size` exits.
    pub clear_duration: Duration,
}

impl PoolConfig {
    /// Sets the initial/target worker count.
    #[must_use]
    pub fn with_running_size(mut self, n: usize) -> Self {
        self.running_size = n;
        self
    }

    /// Sets the request queue capacity.
    #[must_use]
    pub fn with_waiting_size(mut self, n: usize) -> Self {
        self.waiting_size = n;
        self
    }

    /// Sets the worker cap (`0` = unbounded).
    #[must_use]
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    /// Sets the idle timeout (`0s` = never retire).
    #[must_use]
    pub fn with_clear_duration(mut self, d: Duration) -> Self {
        self.clear_duration = d;
        self
    }

    /// Returns the worker cap as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` workers
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrency == 0 {
            None
        } else {
            Some(self.max_concurrency)
        }
    }

    /// Returns the idle timeout as an `Option`.
    #[inline]
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.clear_duration.is_zero() {
            None
        } else {
            Some(self.clear_duration)
        }
    }

    /// Returns the queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn waiting_capacity(&self) -> usize {
        self.waiting_size.max(1)
    }

    /// Workers to start at `open`: `running_size`, capped by the concurrency limit.
    #[inline]
    pub fn initial_workers(&self) -> usize {
        match self.concurrency_limit() {
            Some(max) => self.running_size.min(max),
            None => self.running_size,
        }
    }
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - `running_size = 2`
    /// - `waiting_size = 4`
    /// - `max_concurrency = 0` (unbounded)
    /// - `clear_duration = 5s`
    fn default() -> Self {
        Self {
            running_size: 2,
            waiting_size: 4,
            max_concurrency: 0,
            clear_duration: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_map_to_options() {
        let cfg = PoolConfig::default()
            .with_waiting_size(0)
            .with_clear_duration(Duration::ZERO);
        assert_eq!(cfg.concurrency_limit(), None);
        assert_eq!(cfg.idle_timeout(), None);
        assert_eq!(cfg.waiting_capacity(), 1);
    }

    #[test]
    fn initial_workers_respect_the_cap() {
        let cfg = PoolConfig::default()
            .with_running_size(8)
            .with_max_concurrency(3);
        assert_eq!(cfg.initial_workers(), 3);
        assert_eq!(PoolConfig::default().initial_workers(), 2);
    }
}
