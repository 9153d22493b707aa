//! # Signal-to-action mapping for routine runs.
//!
//! An [`Interruptor`] names the signal it reacts to and hands out an [`InterruptHandler`].
//! When the signal is delivered during a run the handler is called with the run context and
//! decides whether the run terminates ([`Interrupt::Terminate`]) or keeps going
//! ([`Interrupt::Continue`]). A handler may cancel the run itself through the context.

use std::sync::Arc;

use crate::context::Context;
use crate::signals::Signal;

/// Decision returned by an interrupt handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    /// End the run with [`Error::Interrupted`](crate::Error::Interrupted).
    Terminate,
    /// Ignore the signal and keep waiting.
    Continue,
}

/// Callback invoked on signal delivery.
pub type InterruptHandler = Arc<dyn Fn(&Context) -> Interrupt + Send + Sync>;

/// Pairs a signal with a handler.
pub trait Interruptor: Send + Sync + 'static {
    /// The signal this interruptor reacts to.
    fn signal(&self) -> Signal;

    /// The handler to run when [`signal`](Self::signal) is delivered.
    fn interrupt(&self) -> InterruptHandler;
}

/// Cancels the run context, then defers to an optional handler (default: terminate).
pub struct CancelInterruptor {
    signal: Signal,
    handler: Option<InterruptHandler>,
}

impl CancelInterruptor {
    /// Creates an interruptor for `signal`.
    pub fn new(signal: Signal, handler: Option<InterruptHandler>) -> Self {
        Self { signal, handler }
    }
}

impl Interruptor for CancelInterruptor {
    fn signal(&self) -> Signal {
        self.signal
    }

    fn interrupt(&self) -> InterruptHandler {
        let handler = self.handler.clone();
        Arc::new(move |ctx: &Context| {
            ctx.cancel();
            match &handler {
                Some(h) => h(ctx),
                None => Interrupt::Terminate,
            }
        })
    }
}

/// Runs an ad-hoc callback on `signal` and keeps the run going.
pub struct Trap {
    signal: Signal,
    callback: Arc<dyn Fn() + Send + Sync>,
}

impl Trap {
    /// Creates a trap for `signal`.
    pub fn new(signal: Signal, callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            signal,
            callback: Arc::new(callback),
        }
    }
}

impl Interruptor for Trap {
    fn signal(&self) -> Signal {
        self.signal
    }

    fn interrupt(&self) -> InterruptHandler {
        let callback = self.callback.clone();
        Arc::new(move |_ctx: &Context| {
            callback();
            Interrupt::Continue
        })
    }
}

/// `SIGINT` and `SIGTERM`, both cancelling and terminating the run.
pub fn default_interruptors() -> Vec<Arc<dyn Interruptor>> {
    vec![
        Arc::new(CancelInterruptor::new(Signal::INTERRUPT, None)),
        Arc::new(CancelInterruptor::new(Signal::TERMINATE, None)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cancel_interruptor_cancels_then_terminates() {
        let ctx = Context::new();
        let handler = CancelInterruptor::new(Signal::INTERRUPT, None).interrupt();
        assert_eq!(handler(&ctx), Interrupt::Terminate);
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn custom_handler_decides() {
        let ctx = Context::new();
        let keep_going: InterruptHandler = Arc::new(|_ctx: &Context| Interrupt::Continue);
        let handler = CancelInterruptor::new(Signal::HANGUP, Some(keep_going)).interrupt();
        assert_eq!(handler(&ctx), Interrupt::Continue);
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn trap_runs_callback_without_cancelling() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let trap = Trap::new(Signal::HANGUP, move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let ctx = Context::new();
        assert_eq!(trap.interrupt()(&ctx), Interrupt::Continue);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn defaults_cover_interrupt_and_terminate() {
        let sigs: Vec<Signal> = default_interruptors().iter().map(|i| i.signal()).collect();
        assert_eq!(sigs, vec![Signal::INTERRUPT, Signal::TERMINATE]);
    }
}
