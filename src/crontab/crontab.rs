//! # Crontab: jobs on a shared pool.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::context::Context;
use crate::crontab::job::{Job, Plan};
use crate::error::Error;
use crate::executors::ExecutorRef;
use crate::pool::{Pool, PoolConfig};
use crate::schedule::Schedule;

/// Scheduler dispatching due jobs onto its own [`Pool`].
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use routine::{args, Context, Crontab, ExecutorFn, PoolConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), routine::Error> {
/// let crontab = Crontab::new(PoolConfig::default());
/// let ctx = Context::new();
/// crontab.open(&ctx);
///
/// let report = ExecutorFn::arc(|ctx: Context| async move {
///     println!("fired at {:?}", ctx.fire_time());
///     Ok(())
/// });
/// crontab.job("0 * * * *", report)?.go(&ctx, args![]).await?;
///
/// crontab.close();
/// # Ok(())
/// # }
/// ```
pub struct Crontab {
    pool: Pool,
    jobs: Mutex<Vec<Job>>,
}

impl Crontab {
    /// Creates a crontab whose pool uses `cfg`.
    pub fn new(cfg: PoolConfig) -> Self {
        Self {
            pool: Pool::new(cfg),
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Opens the underlying pool.
    pub fn open(&self, ctx: &Context) {
        self.pool.open(ctx);
    }

    /// Stops every registered job, then closes the pool.
    pub fn close(&self) {
        let jobs = std::mem::take(&mut *self.jobs.lock().unwrap_or_else(PoisonError::into_inner));
        for job in &jobs {
            job.close();
        }
        self.pool.close();
    }

    /// The pool jobs are dispatched to.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Creates a job firing at every occurrence of the cron expression `expr`.
    pub fn job(&self, expr: &str, exec: ExecutorRef) -> Result<Job, Error> {
        let schedule = Schedule::parse(expr)?;
        Ok(self.register(Plan::Cron(schedule), exec))
    }

    /// Creates a job firing every `interval`.
    pub fn every(&self, interval: Duration, exec: ExecutorRef) -> Job {
        self.register(Plan::Every(interval), exec)
    }

    /// Creates a job firing once, as soon as it is started.
    pub fn now(&self, exec: ExecutorRef) -> Job {
        self.register(Plan::Once, exec)
    }

    fn register(&self, plan: Plan, exec: ExecutorRef) -> Job {
        let job = Job::new(plan, exec, self.pool.clone());
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job.clone());
        job
    }
}
