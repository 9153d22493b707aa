//! # Crontab scheduling.
//!
//! - [`Crontab`]: owns a pool and the jobs dispatched to it.
//! - [`Job`]: one scheduled executor; [`Plan`] says when it fires.

#[allow(clippy::module_inception)]
mod crontab;
mod job;

pub use crontab::Crontab;
pub use job::{Job, Plan};
