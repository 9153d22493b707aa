//! POSIX signal numbers.

use std::fmt;

/// An OS signal identified by its raw POSIX number.
///
/// ```
/// use routine::Signal;
///
/// assert_eq!(Signal::INTERRUPT.name(), Some("SIGINT"));
/// assert_eq!(Signal::TERMINATE.exit_code(), 143);
/// assert_eq!(Signal::from_raw(10).to_string(), "signal 10");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signal(i32);

impl Signal {
    /// `SIGHUP`.
    pub const HANGUP: Signal = Signal(1);
    /// `SIGINT` (Ctrl-C).
    pub const INTERRUPT: Signal = Signal(2);
    /// `SIGQUIT`.
    pub const QUIT: Signal = Signal(3);
    /// `SIGTERM`.
    pub const TERMINATE: Signal = Signal(15);

    /// Wraps a raw signal number.
    pub const fn from_raw(signo: i32) -> Self {
        Signal(signo)
    }

    /// Raw signal number.
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// Shell exit code of a process terminated by this signal (`128 + signo`).
    pub const fn exit_code(self) -> i32 {
        128 + self.0
    }

    /// Conventional name for the well-known signals.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Signal::HANGUP => Some("SIGHUP"),
            Signal::INTERRUPT => Some("SIGINT"),
            Signal::QUIT => Some("SIGQUIT"),
            Signal::TERMINATE => Some("SIGTERM"),
            _ => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "signal {}", self.0),
        }
    }
}

#[cfg(unix)]
impl From<Signal> for tokio::signal::unix::SignalKind {
    fn from(sig: Signal) -> Self {
        tokio::signal::unix::SignalKind::from_raw(sig.0)
    }
}
