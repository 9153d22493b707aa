//! # Pool worker loop.
//!
//! ```text
//! loop {
//!   select {
//!     idle timeout  → retire if surplus and nothing is queued, else keep waiting
//!     root done     → refuse queued requests, exit
//!     recv request  → closed queue?  reply PoolClosed
//!                     request done?  reply its context error
//!                     otherwise      run under a child context, reply result
//!                     (closed queue covers a cancelled root as well)
//!     channel empty and closed → exit, handing the slot to the current queue
//!   }
//! }
//! ```
//!
//! Every worker owns a [`WorkerSlot`]; dropping the slot (normal exit or unwinding) releases
//! its place in the live-worker count. Slots are tagged with the open/close generation they
//! were started for, so a worker draining a closed queue still counts against the cap.

use std::future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time;

use crate::context::Context;
use crate::error::Error;
use crate::pool::pool::{Inner, Queue, Request};

/// One unit of the live-worker count, released exactly once.
pub(crate) struct WorkerSlot {
    inner: Arc<Inner>,
    generation: u64,
    active: bool,
}

impl WorkerSlot {
    /// Wraps a slot that was already counted by the caller.
    pub(crate) fn reserved(inner: Arc<Inner>, generation: u64) -> Self {
        Self {
            inner,
            generation,
            active: true,
        }
    }

    /// Releases the slot if the worker is surplus and its queue is empty.
    ///
    /// A worker of an earlier generation is always surplus; its place goes to the current queue.
    ///
    /// Checked under the state lock, so a request enqueued before the check keeps the worker,
    /// and one enqueued after it finds no worker and spawns one.
    fn try_retire(&mut self) -> bool {
        let mut state = self.inner.state();
        let mine = state.generation == self.generation;
        if mine && state.pending() > 0 {
            return false;
        }
        if !state.surplus(self.generation, self.inner.cfg.running_size) {
            return false;
        }
        state.release(self.generation);
        self.active = false;
        self.inner.replenish(&mut state);
        true
    }

    /// Releases the slot on a normal exit and refills the current queue's workers.
    fn finish(mut self) {
        let mut state = self.inner.state();
        state.release(self.generation);
        self.active = false;
        self.inner.replenish(&mut state);
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        if self.active {
            self.inner.state().release(self.generation);
        }
    }
}

pub(crate) async fn work(mut slot: WorkerSlot, queue: Arc<Queue>, root: Context) {
    let idle = slot.inner.cfg.idle_timeout();
    tracing::debug!(running = slot.inner.running(), "pool worker started");
    loop {
        let request = tokio::select! {
            _ = idle_for(idle) => {
                if slot.try_retire() {
                    tracing::debug!("idle pool worker retired");
                    return;
                }
                continue;
            }
            _ = root.cancelled() => {
                queue.shut().await;
                slot.finish();
                return;
            }
            request = queue.recv() => request,
        };
        let Some(request) = request else {
            slot.finish();
            return;
        };
        dispatch(&queue, &root, request).await;
    }
}

async fn dispatch(queue: &Queue, root: &Context, request: Request) {
    let Request { ctx, exec, reply } = request;
    if queue.closed.load(Ordering::Acquire) || root.is_cancelled() {
        let _ = reply.send(Err(Error::PoolClosed));
        return;
    }
    if let Some(err) = ctx.err() {
        let _ = reply.send(Err(err));
        return;
    }

    let job = ctx.child();
    let _release = job.token().clone().drop_guard();
    let mut fut = exec.execute(job.clone());
    let res = tokio::select! {
        res = &mut fut => res,
        _ = root.cancelled() => {
            job.cancel();
            fut.await
        }
    };
    if reply.send(res).is_err() {
        tracing::trace!("pool submission dropped before completion");
    }
}

async fn idle_for(d: Option<Duration>) {
    match d {
        Some(d) => time::sleep(d).await,
        None => future::pending().await,
    }
}
