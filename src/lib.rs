//! # routine
//!
//! **Routine** is a structured-concurrency runtime for tokio.
//!
//! Work is expressed as [`Executor`]s: async units that receive a cancellable [`Context`].
//! Executors compose by wrapping (retry, repeat, timeout, fan-out, cron, ...), run on
//! bounded worker [`Pool`]s or on a [`Crontab`], and are supervised by a [`Routine`] that
//! owns prepare/cleanup hooks, child executors, OS signals and the join barrier.
//!
//! ## Architecture
//! ```text
//!                      ┌──────────────────────────────────────┐
//!  execute(ctx) ─────► │ Routine                              │
//!                      │  prepare ─► serve ─► join ─► cleanup │
//!                      └──┬───────────┬──────────────┬────────┘
//!                         │           │              │
//!                 main executor   children     SignalSet ─► Interruptors
//!                         │           │
//!                         ▼           ▼
//!                  ┌──────────────────────────┐        ┌───────────────┐
//!                  │ Context (token, deadline,│ ─────► │ Tracker       │
//!                  │ arguments, tracker, ...) │        │ (join barrier)│
//!                  └──────────┬───────────────┘        └───────────────┘
//!                             ▼
//!        decorators: Guarantee · Retry · Backoff · Repeat · Timeout · Deadline
//!                    Concurrent · Parallel · Append · CronExecutor · Command
//!                             │
//!                             ▼
//!                  Pool (queue + elastic workers) ◄── Crontab (cron / every / once)
//! ```
//!
//! ## Features
//! | Area            | Description                                                    | Key types                               |
//! |-----------------|----------------------------------------------------------------|-----------------------------------------|
//! | **Executors**   | Async units of work and function adapters.                     | [`Executor`], [`ExecutorFn`]            |
//! | **Decorators**  | Retry, repeat, timeouts, fan-out, sequencing, cron, processes. | [`Retry`], [`Timeout`], [`Command`]     |
//! | **Context**     | Cancellation, deadlines, arguments and tracked spawning.       | [`Context`], [`Tracker`], [`Arguments`] |
//! | **Supervision** | Prepare/serve/cleanup lifecycle with signal handling.          | [`Routine`], [`Handle`]                 |
//! | **Pools**       | Bounded queue with elastic worker count.                       | [`Pool`], [`PoolConfig`]                |
//! | **Scheduling**  | Cron expressions, fixed intervals and one-shot jobs.           | [`Crontab`], [`Schedule`]               |
//! | **Tracing**     | Structured run events fanned out to sinks.                     | [`Subscribe`], [`Event`], [`LogWriter`] |
//! | **Errors**      | One error type and process exit codes.                         | [`Error`], [`Code`]                     |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use routine::{Context, Error, ExecutorFn, Retry, Routine, Timeout};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Error> {
//!     let hello = ExecutorFn::new(|ctx: Context| async move {
//!         if ctx.retry() < 2 {
//!             return Err(Error::failed("not yet"));
//!         }
//!         println!("hello on attempt {}", ctx.retry());
//!         Ok(())
//!     });
//!
//!     let main = Timeout::new(Duration::from_secs(5), Retry::new(3, hello));
//!     Routine::builder(main)
//!         .cleanup(ExecutorFn::new(|_ctx| async { Ok(()) }))
//!         .build()
//!         .execute(Context::new())
//!         .await
//! }
//! ```
mod context;
mod core;
mod crontab;
mod error;
mod events;
mod executors;
mod pool;
mod schedule;
mod signals;
mod subscribers;

// ---- Public re-exports ----

pub use context::{Arg, Arguments, Context, TrackGuard, Tracker};
pub use core::{Handle, Routine, RoutineBuilder, State};
pub use crontab::{Crontab, Job, Plan};
pub use error::{Code, Error};
pub use events::{Event, EventKind};
pub use executors::{
    Append, Backoff, BackoffPolicy, Buffer, Command, Concurrent, CronExecutor, Deadline,
    Executor, ExecutorFn, ExecutorRef, Guarantee, Input, JitterPolicy, Middleware, MuteWindow,
    Output, Parallel, Repeat, Retry, Timeout, into_ref, with_middleware,
};
pub use pool::{Pool, PoolConfig, Submission};
pub use schedule::Schedule;
pub use signals::{
    CancelInterruptor, Interrupt, InterruptHandler, Interruptor, Signal, SignalSet, Trap,
    default_interruptors,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
