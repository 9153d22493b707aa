//! # Run-scope context.
//!
//! Every executor invocation receives a [`Context`]: an immutable, cheaply clonable handle that
//! carries the cancellation signal, an optional deadline and the optional attributes a run
//! inherits (join barrier, caller arguments, retry/repeat counters, cron fire time and a weak
//! back-reference to the supervising routine).
//!
//! - [`Context`] - the handle itself; attributes are added by deriving a new context
//! - [`Arguments`] - opaque caller-supplied values with typed accessors
//! - [`Tracker`] - counter-based join barrier for in-flight tasks
//!
//! ## Derivation
//! ```text
//! root ──child()──► ctx ──with_timeout(d)──► ctx' ──with_retry(2)──► ctx''
//!   │                 │                        │
//!   └── cancel() ─────┴──────── propagates ────┘  (never upward)
//! ```

mod arguments;
#[allow(clippy::module_inception)]
mod context;
mod tracker;

pub use arguments::{Arg, Arguments};
pub use context::Context;
pub use tracker::{TrackGuard, Tracker};
