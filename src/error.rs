//! Error and exit-code types shared by every part of the runtime.
//!
//! - [`Error`]: the single error type returned by executors, decorators, pools and routines.
//! - [`Code`]: process exit codes derived from an [`Error`] (signal-derived codes use `128 + signo`).
//!
//! Both types provide `as_label` helpers for logging/metrics.

use std::fmt;
use std::process::ExitStatus;

use thiserror::Error;

use crate::signals::Signal;

/// # Errors produced by executors and the runtime.
///
/// The variants fall into four groups:
/// - **configuration**: [`NoContext`](Error::NoContext), [`NoExecutor`](Error::NoExecutor),
///   [`InvalidArguments`](Error::InvalidArguments), [`InvalidSchedule`](Error::InvalidSchedule).
///   Surfaced immediately, never retried by the runtime itself.
/// - **cancellation**: [`Canceled`](Error::Canceled), [`DeadlineExceeded`](Error::DeadlineExceeded),
///   [`Interrupted`](Error::Interrupted). See [`Error::is_cancellation`].
/// - **executor failures**: [`Failed`](Error::Failed), [`Command`](Error::Command),
///   [`Io`](Error::Io), [`Panicked`](Error::Panicked), optionally wrapped by
///   [`Annotated`](Error::Annotated).
/// - **runtime state**: [`PoolClosed`](Error::PoolClosed), [`AlreadyRunning`](Error::AlreadyRunning),
///   [`NoRemainingPlan`](Error::NoRemainingPlan).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// The context was cancelled.
    #[error("context canceled")]
    Canceled,

    /// The context deadline passed before the work completed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A run was terminated by an OS signal.
    #[error("interrupted by {signal}")]
    Interrupted {
        /// The delivered signal.
        signal: Signal,
    },

    /// An operation required a context and none was supplied.
    #[error("context required")]
    NoContext,

    /// An operation required an executor and none was configured.
    #[error("executor required")]
    NoExecutor,

    /// Invalid caller-supplied arguments.
    #[error("invalid arguments: {reason}")]
    InvalidArguments {
        /// What was wrong.
        reason: String,
    },

    /// A cron expression could not be parsed.
    #[error("invalid schedule {expr:?}: {reason}")]
    InvalidSchedule {
        /// The rejected expression.
        expr: String,
        /// What was wrong.
        reason: String,
    },

    /// The schedule has no further occurrence.
    #[error("no remaining plan")]
    NoRemainingPlan,

    /// The pool was closed (or never opened) when the request was handled.
    #[error("pool closed")]
    PoolClosed,

    /// `execute` was re-entered while the routine was already running.
    #[error("routine already running")]
    AlreadyRunning,

    /// An error annotated with its position in a chain (iteration, sequence index, ...).
    #[error("{context}: {source}")]
    Annotated {
        /// Position prefix, e.g. `repeat 3`.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Executor-reported failure.
    #[error("execution failed: {0}")]
    Failed(String),

    /// A panic captured at a [`Guarantee`](crate::Guarantee) boundary.
    #[error("panicked: {0}")]
    Panicked(String),

    /// An external process exited unsuccessfully.
    #[error("command {program:?} exited with {status}")]
    Command {
        /// Program name.
        program: String,
        /// Exit status reported by the OS.
        status: ExitStatus,
    },

    /// I/O failure (process spawn, pipes, signal registration).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates an executor failure from any displayable message.
    ///
    /// ```
    /// use routine::Error;
    ///
    /// let err = Error::failed("boom");
    /// assert_eq!(err.to_string(), "execution failed: boom");
    /// ```
    pub fn failed(msg: impl fmt::Display) -> Self {
        Error::Failed(msg.to_string())
    }

    /// Wraps `self` with a position prefix.
    pub fn annotate(self, context: impl Into<String>) -> Self {
        Error::Annotated {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, looking through [`Error::Annotated`] layers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Annotated { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns `true` if the error reports a cancelled context (possibly annotated).
    ///
    /// ```
    /// use routine::Error;
    ///
    /// assert!(Error::DeadlineExceeded.annotate("repeat 2").is_cancellation());
    /// assert!(!Error::failed("boom").is_cancellation());
    /// ```
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self.root(),
            Error::Canceled | Error::DeadlineExceeded | Error::Interrupted { .. }
        )
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::Canceled => "canceled",
            Error::DeadlineExceeded => "deadline_exceeded",
            Error::Interrupted { .. } => "interrupted",
            Error::NoContext => "no_context",
            Error::NoExecutor => "no_executor",
            Error::InvalidArguments { .. } => "invalid_arguments",
            Error::InvalidSchedule { .. } => "invalid_schedule",
            Error::NoRemainingPlan => "no_remaining_plan",
            Error::PoolClosed => "pool_closed",
            Error::AlreadyRunning => "already_running",
            Error::Annotated { source, .. } => source.as_label(),
            Error::Failed(_) => "failed",
            Error::Panicked(_) => "panicked",
            Error::Command { .. } => "command_failed",
            Error::Io(_) => "io",
        }
    }

    /// Maps the error to a process exit code.
    pub fn code(&self) -> Code {
        match self.root() {
            Error::Interrupted { signal } => Code::Signal(*signal),
            Error::NoContext => Code::NoContext,
            Error::NoExecutor => Code::NoExecutor,
            Error::InvalidArguments { .. } | Error::InvalidSchedule { .. } => {
                Code::InvalidArguments
            }
            Error::NoRemainingPlan => Code::NoRemainingPlan,
            _ => Code::GeneralError,
        }
    }
}

/// # Process exit codes.
///
/// Library-level codes cover non-signal outcomes; [`Code::Signal`] follows the shell
/// convention `128 + signal-number`.
///
/// ```
/// use routine::{Code, Signal};
///
/// assert_eq!(Code::Signal(Signal::INTERRUPT).value(), 130);
/// assert_eq!(Code::Signal(Signal::INTERRUPT).to_string(), "Code(130)");
/// assert_eq!(Code::Ok.to_string(), "OK");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Code {
    /// Success.
    Ok,
    /// Unclassified failure.
    GeneralError,
    /// Bad arguments or configuration.
    InvalidArguments,
    /// No executor configured.
    NoExecutor,
    /// No context supplied.
    NoContext,
    /// A schedule ran out of occurrences.
    NoRemainingPlan,
    /// Terminated by a signal.
    Signal(Signal),
}

impl Code {
    /// Numeric exit code.
    pub fn value(&self) -> i32 {
        match self {
            Code::Ok => 0,
            Code::GeneralError => 1,
            Code::InvalidArguments => 2,
            Code::NoExecutor => 3,
            Code::NoContext => 4,
            Code::NoRemainingPlan => 5,
            Code::Signal(sig) => sig.exit_code(),
        }
    }

    /// Exit code for a run result.
    pub fn of(res: &Result<(), Error>) -> Code {
        match res {
            Ok(()) => Code::Ok,
            Err(e) => e.code(),
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Ok => f.write_str("OK"),
            Code::GeneralError => f.write_str("GeneralError"),
            Code::InvalidArguments => f.write_str("InvalidArguments"),
            Code::NoExecutor => f.write_str("NoExecutor"),
            Code::NoContext => f.write_str("NoContext"),
            Code::NoRemainingPlan => f.write_str("NoRemainingPlan"),
            Code::Signal(_) => write!(f, "Code({})", self.value()),
        }
    }
}

impl From<&Error> for Code {
    fn from(err: &Error) -> Self {
        err.code()
    }
}

impl From<Code> for std::process::ExitCode {
    fn from(code: Code) -> Self {
        std::process::ExitCode::from(u8::try_from(code.value()).unwrap_or(u8::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotated_errors_keep_root_label_and_code() {
        let err = Error::NoRemainingPlan.annotate("append #2");
        assert_eq!(err.as_label(), "no_remaining_plan");
        assert_eq!(err.code(), Code::NoRemainingPlan);
        assert_eq!(err.to_string(), "append #2: no remaining plan");
    }

    #[test]
    fn signal_codes_follow_shell_convention() {
        let err = Error::Interrupted {
            signal: Signal::TERMINATE,
        };
        assert_eq!(err.code().value(), 143);
        assert!(err.is_cancellation());
    }

    #[test]
    fn library_codes_render_names() {
        assert_eq!(Code::InvalidArguments.to_string(), "InvalidArguments");
        assert_eq!(Code::of(&Ok(())), Code::Ok);
        assert_eq!(Code::of(&Err(Error::failed("x"))), Code::GeneralError);
        assert_eq!(
            Error::InvalidSchedule {
                expr: "x".into(),
                reason: "y".into()
            }
            .code(),
            Code::InvalidArguments
        );
    }
}
