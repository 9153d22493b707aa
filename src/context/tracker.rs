//! # Join barrier for in-flight work.
//!
//! [`Tracker`] is a reference-counted "in-flight" counter. Spawners register work with
//! [`Tracker::add`] (or the RAII [`Tracker::guard`]) *before* the task starts and deregister on
//! every exit path; [`Tracker::join`] waits until the counter returns to zero.
//!
//! ## Rules
//! - Clones share one counter.
//! - `done()` on a zero counter is a no-op (never underflows).
//! - [`TrackGuard`] deregisters on drop, so unwinding tasks are released too.

use std::sync::Arc;

use tokio::sync::watch;

/// Counter-based join barrier.
#[derive(Clone, Debug)]
pub struct Tracker {
    count: Arc<watch::Sender<usize>>,
}

impl Tracker {
    /// Creates a tracker with nothing in flight.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0usize);
        Self {
            count: Arc::new(tx),
        }
    }

    /// Registers `n` units of in-flight work.
    pub fn add(&self, n: usize) {
        if n > 0 {
            self.count.send_modify(|c| *c += n);
        }
    }

    /// Deregisters one unit of in-flight work.
    pub fn done(&self) {
        self.count.send_if_modified(|c| {
            if *c == 0 {
                return false;
            }
            *c -= 1;
            true
        });
    }

    /// Returns the number of registered, unfinished units.
    pub fn in_flight(&self) -> usize {
        *self.count.borrow()
    }

    /// Waits until every registered unit has called `done`.
    ///
    /// Returns immediately when nothing is in flight.
    pub async fn join(&self) {
        let mut rx = self.count.subscribe();
        let _ = rx.wait_for(|c| *c == 0).await;
    }

    /// Registers one unit and returns a guard that deregisters it on drop.
    #[must_use = "dropping the guard immediately deregisters the work"]
    pub fn guard(&self) -> TrackGuard {
        self.add(1);
        TrackGuard {
            tracker: self.clone(),
        }
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration held by a tracked task; calls [`Tracker::done`] when dropped.
#[derive(Debug)]
pub struct TrackGuard {
    tracker: Tracker,
}

impl Drop for TrackGuard {
    fn drop(&mut self) {
        self.tracker.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn join_returns_immediately_when_idle() {
        let t = Tracker::new();
        t.join().await;
        assert_eq!(t.in_flight(), 0);
    }

    #[tokio::test]
    async fn done_never_underflows() {
        let t = Tracker::new();
        t.done();
        t.done();
        assert_eq!(t.in_flight(), 0);
        t.add(2);
        t.done();
        assert_eq!(t.in_flight(), 1);
    }

    #[tokio::test]
    async fn join_waits_for_all_guards() {
        let t = Tracker::new();
        let finished = Arc::new(AtomicUsize::new(0));

        for i in 0..4u64 {
            let guard = t.guard();
            let finished = finished.clone();
            tokio::spawn(async move {
                let _guard = guard;
                tokio::time::sleep(Duration::from_millis(5 * i)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }

        t.join().await;
        assert_eq!(finished.load(Ordering::SeqCst), 4);
        assert_eq!(t.in_flight(), 0);
    }

    #[tokio::test]
    async fn panicking_task_releases_its_guard() {
        let t = Tracker::new();
        let guard = t.guard();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("boom");
        });
        assert!(handle.await.unwrap_err().is_panic());
        t.join().await;
        assert_eq!(t.in_flight(), 0);
    }
}
