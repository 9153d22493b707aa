//! Runtime core: the supervised run and its control handle.
//!
//! Internal modules:
//! - [`routine`]: prepare, serve, join and cleanup around a main executor;
//! - [`builder`]: option collection for [`Routine`];
//! - [`handle`]: run state shared with [`Handle`]s and contexts.

mod builder;
mod handle;
mod routine;

pub use builder::RoutineBuilder;
pub use handle::{Handle, State};
pub use routine::Routine;

pub(crate) use handle::Shared;
