//! # Cron-driven repetition.
//!
//! [`CronExecutor`] sleeps until the next occurrence of its [`Schedule`], invokes the wrapped
//! executor with the fire time attached to the context ([`Context::fire_time`]) and repeats.
//! Occurrences inside a mute window or on a muted weekday class are skipped.
//!
//! The loop ends when:
//! - the context is cancelled (returns the context error),
//! - the wrapped executor fails (returns its error),
//! - the schedule yields no further occurrence ([`Error::NoRemainingPlan`]).

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, Weekday};
use tokio::time;

use crate::context::Context;
use crate::error::Error;
use crate::executors::{Executor, ExecutorRef, into_ref};
use crate::schedule::Schedule;

/// Interval during which occurrences are skipped; both bounds are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MuteWindow {
    /// Start of the window.
    pub begin: DateTime<Local>,
    /// End of the window.
    pub end: DateTime<Local>,
}

impl MuteWindow {
    /// Returns `true` if `t` is strictly inside the window.
    pub fn contains(&self, t: &DateTime<Local>) -> bool {
        self.begin < *t && *t < self.end
    }
}

/// Runs the wrapped executor at every occurrence of a cron schedule.
pub struct CronExecutor {
    schedule: Schedule,
    workday: bool,
    weekend: bool,
    mutes: Vec<MuteWindow>,
    exec: ExecutorRef,
}

impl CronExecutor {
    /// Parses `plan` and wraps `exec`.
    pub fn new(plan: &str, exec: impl Executor) -> Result<Self, Error> {
        Ok(Self::with_schedule(plan.parse()?, exec))
    }

    /// Wraps `exec` with an already parsed schedule.
    pub fn with_schedule(schedule: Schedule, exec: impl Executor) -> Self {
        Self {
            schedule,
            workday: false,
            weekend: false,
            mutes: Vec::new(),
            exec: into_ref(exec),
        }
    }

    /// Restricts runs to workdays (Saturday and Sunday are muted).
    pub fn workday(mut self, flag: bool) -> Self {
        self.workday = flag;
        self
    }

    /// Restricts runs to weekends (Monday to Friday are muted).
    pub fn weekend(mut self, flag: bool) -> Self {
        self.weekend = flag;
        self
    }

    /// Clears both weekday restrictions.
    pub fn everyday(mut self) -> Self {
        self.workday = false;
        self.weekend = false;
        self
    }

    /// Adds a mute window.
    pub fn mute(mut self, begin: DateTime<Local>, end: DateTime<Local>) -> Self {
        self.mutes.push(MuteWindow { begin, end });
        self
    }

    /// The schedule driving this executor.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Returns `true` if an occurrence at `t` would be skipped.
    pub fn is_muted(&self, t: &DateTime<Local>) -> bool {
        if self.mutes.iter().any(|m| m.contains(t)) {
            return true;
        }
        match t.weekday() {
            Weekday::Sat | Weekday::Sun => self.workday,
            _ => self.weekend,
        }
    }
}

#[async_trait]
impl Executor for CronExecutor {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        let mut next = self
            .schedule
            .next_after(&Local::now())
            .ok_or(Error::NoRemainingPlan)?;
        loop {
            let wait = (next - Local::now()).to_std().unwrap_or_default();
            tokio::select! {
                _ = ctx.cancelled() => return Err(ctx.err().unwrap_or(Error::Canceled)),
                _ = time::sleep(wait) => {}
            }

            if self.is_muted(&next) {
                tracing::debug!(schedule = %self.schedule, fire_time = %next, "occurrence muted");
            } else {
                self.exec.execute(ctx.with_fire_time(next)).await?;
            }

            next = self
                .schedule
                .next_after(&Local::now().max(next))
                .ok_or(Error::NoRemainingPlan)?;
        }
    }
}
