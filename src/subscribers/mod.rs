//! # Trace sinks for routine runs.
//!
//! A [`Routine`](crate::Routine) configured with `trace(sink)` creates a [`SubscriberSet`] per
//! run and emits its [`Event`](crate::Event)s into it. Every sink implements [`Subscribe`].
//!
//! ```text
//! Routine ── emit(Event) ──► SubscriberSet ──► [queue] ──► Subscribe::on_event()
//!                                          └──► [queue] ──► LogWriter (tracing::info!)
//! ```

mod log;
mod subscriber;
mod subscriber_set;

pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
