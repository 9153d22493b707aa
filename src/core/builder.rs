use std::sync::Arc;

use crate::{
    context::Arguments,
    executors::{Executor, ExecutorRef, into_ref},
    signals::{CancelInterruptor, Interruptor, Signal, Trap, default_interruptors},
    subscribers::Subscribe,
};

use super::routine::Routine;

/// Options collected by [`RoutineBuilder`].
#[derive(Default)]
pub(crate) struct Options {
    pub(crate) arguments: Option<Arguments>,
    pub(crate) interrupts: Vec<Arc<dyn Interruptor>>,
    pub(crate) prepare: Option<ExecutorRef>,
    pub(crate) cleanup: Option<ExecutorRef>,
    pub(crate) children: Vec<ExecutorRef>,
    pub(crate) sinks: Vec<Arc<dyn Subscribe>>,
}

/// Builder for constructing a [`Routine`] around a main executor.
///
/// Options apply in call order. `arguments`, `prepare` and `cleanup` replace earlier values;
/// `go`, `trace`, `interrupts`, `signal` and `cancel_signals` accumulate.
pub struct RoutineBuilder {
    exec: ExecutorRef,
    opts: Options,
}

impl RoutineBuilder {
    /// Creates a new builder for the given main executor.
    pub fn new(exec: impl Executor) -> Self {
        Self {
            exec: into_ref(exec),
            opts: Options::default(),
        }
    }

    /// Sets the arguments visible through [`Context::arguments`](crate::Context::arguments)
    /// inside the run (prepare and cleanup included).
    pub fn arguments(mut self, arguments: Arguments) -> Self {
        self.opts.arguments = Some(arguments);
        self
    }

    /// Adds interruptors observed while the run is serving.
    pub fn interrupts<I>(mut self, interruptors: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Interruptor>>,
    {
        self.opts.interrupts.extend(interruptors);
        self
    }

    /// Adds `SIGINT` and `SIGTERM` as run-cancelling signals.
    pub fn with_default_interrupts(self) -> Self {
        self.interrupts(default_interruptors())
    }

    /// Runs `exec` before anything else; its failure aborts the run.
    pub fn prepare(mut self, exec: impl Executor) -> Self {
        self.opts.prepare = Some(into_ref(exec));
        self
    }

    /// Runs `exec` after every tracked task has finished; failures are only logged.
    pub fn cleanup(mut self, exec: impl Executor) -> Self {
        self.opts.cleanup = Some(into_ref(exec));
        self
    }

    /// Declares a child executor running next to the main one.
    pub fn go(mut self, exec: impl Executor) -> Self {
        self.opts.children.push(into_ref(exec));
        self
    }

    /// Attaches a trace sink for the lifetime of each run.
    ///
    /// Sinks receive [`Event`](crate::Event)s through dedicated workers with bounded queues.
    pub fn trace(mut self, sink: Arc<dyn Subscribe>) -> Self {
        self.opts.sinks.push(sink);
        self
    }

    /// Calls `callback` whenever `signal` is delivered; the run keeps going.
    pub fn signal(mut self, signal: Signal, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.opts.interrupts.push(Arc::new(Trap::new(signal, callback)));
        self
    }

    /// Cancels and terminates the run when any of `signals` is delivered.
    pub fn cancel_signals<I>(mut self, signals: I) -> Self
    where
        I: IntoIterator<Item = Signal>,
    {
        for sig in signals {
            self.opts
                .interrupts
                .push(Arc::new(CancelInterruptor::new(sig, None)));
        }
        self
    }

    /// Builds the routine.
    pub fn build(self) -> Routine {
        Routine::new_internal(self.exec, self.opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Context, Error, args};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Executor for Noop {
        async fn execute(&self, _ctx: Context) -> Result<(), Error> {
            Ok(())
        }
    }

    fn noop() -> Noop {
        Noop
    }

    #[test]
    fn replacing_and_accumulating_options() {
        let b = RoutineBuilder::new(noop())
            .arguments(args![1u8])
            .arguments(args![1u8, 2u8])
            .go(noop())
            .go(noop())
            .signal(Signal::HANGUP, || {})
            .cancel_signals([Signal::INTERRUPT, Signal::TERMINATE])
            .prepare(noop())
            .prepare(noop());
        assert_eq!(b.opts.arguments.as_ref().map(Arguments::len), Some(2));
        assert_eq!(b.opts.children.len(), 2);
        assert_eq!(b.opts.interrupts.len(), 3);
        assert!(b.opts.prepare.is_some());
        assert!(b.opts.cleanup.is_none());
    }

    #[test]
    fn default_interrupts_cover_int_and_term() {
        let b = RoutineBuilder::new(noop()).with_default_interrupts();
        let sigs: Vec<Signal> = b.opts.interrupts.iter().map(|i| i.signal()).collect();
        assert_eq!(sigs, vec![Signal::INTERRUPT, Signal::TERMINATE]);
    }
}
