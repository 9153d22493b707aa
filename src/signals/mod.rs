//! # OS signals and interruptors.
//!
//! - [`Signal`]: raw POSIX signal number with names and exit-code mapping.
//! - [`Interruptor`]: pairs a signal with the decision to make when it arrives.
//! - [`SignalSet`]: the OS subscription a routine run listens on.

mod interruptor;
mod listener;
mod signal;

pub use interruptor::{
    CancelInterruptor, Interrupt, InterruptHandler, Interruptor, Trap, default_interruptors,
};
pub use listener::SignalSet;
pub use signal::Signal;
