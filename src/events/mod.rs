//! Routine events.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//!
//! Events are produced by [`Routine`](crate::Routine) runs and delivered to the run's trace
//! sinks through a [`SubscriberSet`](crate::SubscriberSet).

mod event;

pub use event::{Event, EventKind};
