//! # Guarantee: the executor that never fails.
//!
//! [`Guarantee`] runs the wrapped executor and absorbs whatever comes out of it: errors are
//! logged at `error` level, panics raised while polling the wrapped future are caught with
//! `catch_unwind` and logged the same way. The caller always sees `Ok(())`.
//!
//! **Warning**: `AssertUnwindSafe` is used; state shared through `Arc<Mutex<T>>` may be left
//! inconsistent if the wrapped executor panics while holding the lock.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;

use crate::context::Context;
use crate::error::Error;
use crate::executors::{Executor, ExecutorRef, into_ref};

/// Absorbs failures and panics of the wrapped executor.
pub struct Guarantee {
    exec: ExecutorRef,
}

impl Guarantee {
    /// Wraps `exec`.
    pub fn new(exec: impl Executor) -> Self {
        Self {
            exec: into_ref(exec),
        }
    }
}

#[async_trait]
impl Executor for Guarantee {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        let err = match AssertUnwindSafe(self.exec.execute(ctx)).catch_unwind().await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(panic) => Error::Panicked(panic_message(&*panic)),
        };
        tracing::error!(error = %err, label = err.as_label(), "guaranteed executor failed");
        Ok(())
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
