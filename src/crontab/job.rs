//! # Scheduled jobs.
//!
//! A [`Job`] pairs an executor with a [`Plan`]. Starting it with [`Job::go`]:
//! - **once**: submits the executor to the crontab's pool right away;
//! - **cron / every**: spawns a tracked loop that sleeps until the next fire time and then
//!   submits the executor with the fire time attached ([`Context::fire_time`]).
//!
//! The loop ends on [`Job::close`], when the context is cancelled, when the schedule has no
//! further occurrence, or when the pool refuses work because it was closed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::context::{Arguments, Context};
use crate::error::Error;
use crate::executors::ExecutorRef;
use crate::pool::Pool;
use crate::schedule::Schedule;

/// When a job fires.
#[derive(Clone, Debug)]
pub enum Plan {
    /// At every occurrence of a cron schedule.
    Cron(Schedule),
    /// At a fixed interval, first fire one interval after start.
    Every(Duration),
    /// Once, immediately.
    Once,
}

struct JobInner {
    plan: Plan,
    exec: ExecutorRef,
    pool: Pool,
    stop: CancellationToken,
}

/// A scheduled executor owned by a [`Crontab`](crate::Crontab).
///
/// Cloning is cheap; clones control the same job.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    pub(crate) fn new(plan: Plan, exec: ExecutorRef, pool: Pool) -> Self {
        Self {
            inner: Arc::new(JobInner {
                plan,
                exec,
                pool,
                stop: CancellationToken::new(),
            }),
        }
    }

    /// The job's plan.
    pub fn plan(&self) -> &Plan {
        &self.inner.plan
    }

    /// Next fire time strictly after `now`; `None` when the job does not recur.
    pub fn next(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        match &self.inner.plan {
            Plan::Cron(schedule) => schedule.next_after(&now),
            Plan::Every(d) if !d.is_zero() => {
                let step = chrono::TimeDelta::from_std(*d).ok()?;
                now.checked_add_signed(step)
            }
            Plan::Every(_) | Plan::Once => None,
        }
    }

    /// Starts the job with `args` attached to the context.
    ///
    /// Returns immediately; recurring jobs keep running in a tracked task on `ctx`.
    pub async fn go(&self, ctx: &Context, args: Arguments) -> Result<(), Error> {
        let ctx = ctx.with_arguments(args);
        match &self.inner.plan {
            Plan::Once => {
                self.inner.pool.go(ctx, self.inner.exec.clone()).await?;
                Ok(())
            }
            Plan::Every(d) if d.is_zero() => Err(Error::InvalidArguments {
                reason: "job interval must be positive".into(),
            }),
            _ => {
                let job = self.clone();
                ctx.spawn(job.run(ctx.clone()));
                Ok(())
            }
        }
    }

    /// Stops the recurring loop; submissions already handed to the pool are unaffected.
    pub fn close(&self) {
        self.inner.stop.cancel();
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.inner.stop.is_cancelled()
    }

    async fn run(self, ctx: Context) {
        loop {
            let Some(at) = self.next(Local::now()) else {
                tracing::debug!(plan = ?self.inner.plan, "job has no remaining plan");
                return;
            };
            let wait = (at - Local::now()).to_std().unwrap_or_default();
            tokio::select! {
                _ = self.inner.stop.cancelled() => return,
                _ = ctx.cancelled() => return,
                _ = time::sleep(wait) => {}
            }

            match self
                .inner
                .pool
                .go(ctx.with_fire_time(at), self.inner.exec.clone())
                .await
            {
                Ok(_) => {}
                Err(Error::PoolClosed) => {
                    tracing::debug!("pool closed, job loop ends");
                    return;
                }
                Err(err) => {
                    tracing::warn!(error = %err, fire_time = %at, "job submission failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutorFn, PoolConfig};
    use chrono::TimeZone;

    fn noop() -> ExecutorRef {
        ExecutorFn::arc(|_ctx| async { Ok(()) })
    }

    #[test]
    fn next_follows_the_plan() {
        let pool = Pool::new(PoolConfig::default());
        let now = Local.with_ymd_and_hms(2024, 5, 1, 10, 7, 30).earliest().unwrap();

        let every = Job::new(Plan::Every(Duration::from_secs(90)), noop(), pool.clone());
        assert_eq!(every.next(now), Some(now + chrono::TimeDelta::seconds(90)));

        let cron = Job::new(Plan::Cron("*/10 * * * *".parse().unwrap()), noop(), pool.clone());
        let at = cron.next(now).unwrap();
        assert!(at > now && at - now <= chrono::TimeDelta::minutes(10));

        let once = Job::new(Plan::Once, noop(), pool);
        assert_eq!(once.next(now), None);
    }
}
