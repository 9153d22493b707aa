//! # Executors and executor decorators.
//!
//! An [`Executor`] is the unit of work everything else schedules. Decorators wrap another
//! executor and add behavior without the wrapped executor knowing about it:
//!
//! | Decorator        | Behavior                                                        |
//! |------------------|-----------------------------------------------------------------|
//! | [`Guarantee`]    | swallows errors and panics (logged)                             |
//! | [`Retry`]        | up to `n` attempts, stops at first success                      |
//! | [`Backoff`]      | sleeps between retry attempts                                   |
//! | [`Repeat`]       | `n` invocations (or forever) with a pause between them          |
//! | [`Timeout`]      | bounds the run by a duration                                    |
//! | [`Deadline`]     | bounds the run by an instant                                    |
//! | [`Concurrent`]   | one executor, `n` concurrent instances                          |
//! | [`Parallel`]     | several executors, concurrently                                 |
//! | [`Append`]       | several executors, sequentially                                 |
//! | [`CronExecutor`] | invocations at cron occurrences                                 |
//!
//! [`Command`] is a leaf executor running an external process.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use routine::{Context, Error, Executor, ExecutorFn, Retry, Timeout};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Error> {
//! let fetch = ExecutorFn::new(|ctx: Context| async move {
//!     // first attempt fails, the second one succeeds
//!     if ctx.retry() < 2 { Err(Error::failed("flaky")) } else { Ok(()) }
//! });
//! let exec = Retry::new(3, Timeout::new(Duration::from_secs(1), fetch));
//! exec.execute(Context::new()).await
//! # }
//! ```

mod append;
mod backoff;
mod command;
mod cron;
mod executor;
mod fanout;
mod guarantee;
mod repeat;
mod retry;
mod timeout;

pub use append::Append;
pub use backoff::{Backoff, BackoffPolicy, JitterPolicy};
pub use command::{Buffer, Command, Input, Output};
pub use cron::{CronExecutor, MuteWindow};
pub use executor::{Executor, ExecutorFn, ExecutorRef, Middleware, into_ref, with_middleware};
pub use fanout::{Concurrent, Parallel};
pub use guarantee::Guarantee;
pub use repeat::Repeat;
pub use retry::Retry;
pub use timeout::{Deadline, Timeout};

pub(crate) use guarantee::panic_message;
