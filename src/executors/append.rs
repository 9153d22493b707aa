//! Sequential composition.

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Error;
use crate::executors::{Executor, ExecutorRef, into_ref};

/// Runs executors one after another with the same context.
///
/// The first failure stops the sequence; its error is annotated with the 0-based position
/// as `append #<i>`. An empty sequence succeeds.
#[derive(Default)]
pub struct Append {
    execs: Vec<ExecutorRef>,
}

impl Append {
    /// Creates a sequence from `execs`.
    pub fn new(execs: impl IntoIterator<Item = ExecutorRef>) -> Self {
        Self {
            execs: execs.into_iter().collect(),
        }
    }

    /// Appends `exec` to the end of the sequence.
    pub fn then(mut self, exec: impl Executor) -> Self {
        self.execs.push(into_ref(exec));
        self
    }

    /// Number of executors in the sequence.
    pub fn len(&self) -> usize {
        self.execs.len()
    }

    /// Returns `true` if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.execs.is_empty()
    }
}

#[async_trait]
impl Executor for Append {
    async fn execute(&self, ctx: Context) -> Result<(), Error> {
        for (i, exec) in self.execs.iter().enumerate() {
            exec.execute(ctx.clone())
                .await
                .map_err(|err| err.annotate(format!("append #{i}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutorFn;
    use std::sync::{Arc, Mutex};

    fn step(id: u8, ok: bool, log: Arc<Mutex<Vec<u8>>>) -> impl Executor {
        ExecutorFn::new(move |_ctx: Context| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(id);
                if ok { Ok(()) } else { Err(Error::failed(format!("step {id}"))) }
            }
        })
    }

    #[tokio::test]
    async fn runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seq = Append::default()
            .then(step(1, true, log.clone()))
            .then(step(2, true, log.clone()))
            .then(step(3, true, log.clone()));
        assert!(seq.execute(Context::new()).await.is_ok());
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn stops_at_first_failure_with_position() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seq = Append::default()
            .then(step(1, true, log.clone()))
            .then(step(2, false, log.clone()))
            .then(step(3, true, log.clone()));
        let err = seq.execute(Context::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "append #1: execution failed: step 2");
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn empty_sequence_succeeds() {
        assert!(Append::new([]).execute(Context::new()).await.is_ok());
    }
}
