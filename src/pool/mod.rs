//! # Worker pool.
//!
//! - [`Pool`]: bounded set of workers fed by a bounded queue.
//! - [`PoolConfig`]: sizing (initial workers, queue capacity, cap, idle timeout).
//! - [`Submission`]: the pending result of one submitted job.

mod config;
#[allow(clippy::module_inception)]
mod pool;
mod worker;

pub use config::PoolConfig;
pub use pool::{Pool, Submission};
