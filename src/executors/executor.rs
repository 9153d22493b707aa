//! # Executor abstraction and function-backed executors.
//!
//! This module defines the [`Executor`] trait (async, cancelable) and a function-backed
//! implementation [`ExecutorFn`]. The shared handle type is [`ExecutorRef`], an
//! `Arc<dyn Executor>` suitable for handing to pools, crontabs and routines.
//!
//! Decorators are executors that hold another executor: composition is by wrapping.
//! [`Middleware`] and [`with_middleware`] apply a list of wrappers in one call.
//!
//! ## Example
//! ```rust
//! use routine::{Context, Error, ExecutorFn, ExecutorRef};
//!
//! let hello: ExecutorRef = ExecutorFn::arc(|ctx: Context| async move {
//!     if ctx.is_cancelled() {
//!         return Err(Error::Canceled);
//!     }
//!     Ok(())
//! });
//! # let _ = hello;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Error;

/// # Asynchronous, cancelable unit of work.
///
/// Implementations receive a [`Context`] and should observe [`Context::cancelled`] at their
/// suspension points so that supervisors, timeouts and pools can stop them cooperatively.
/// Caller arguments, retry/repeat counters and the cron fire time are read from the context.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Runs the unit of work to completion, failure or cancellation.
    async fn execute(&self, ctx: Context) -> Result<(), Error>;
}

/// Shared executor handle.
pub type ExecutorRef = Arc<dyn Executor>;

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        (**self).execute(ctx).await
    }
}

/// Function-backed executor.
///
/// Wraps a closure that *creates* a new future per invocation, so no state leaks between
/// invocations unless the closure captures it explicitly (e.g. through an `Arc`).
#[derive(Debug)]
pub struct ExecutorFn<F> {
    f: F,
}

impl<F, Fut> ExecutorFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    /// Creates a new function-backed executor.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the executor and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Executor for ExecutorFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        (self.f)(ctx).await
    }
}

/// Converts any executor into a shared handle.
pub fn into_ref(exec: impl Executor) -> ExecutorRef {
    Arc::new(exec)
}

/// Executor-in, executor-out wrapper.
pub type Middleware = Arc<dyn Fn(ExecutorRef) -> ExecutorRef + Send + Sync>;

/// Wraps `exec` in `middleware`; the first entry becomes the outermost layer.
pub fn with_middleware(exec: ExecutorRef, middleware: &[Middleware]) -> ExecutorRef {
    middleware.iter().rev().fold(exec, |inner, m| m(inner))
}
