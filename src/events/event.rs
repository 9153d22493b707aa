//! # Events emitted by a routine run.
//!
//! The [`EventKind`] enum classifies what happened during a run:
//! - **Lifecycle**: starting, serving, main exit, all joined, stopped.
//! - **Shutdown triggers**: stop requested, context done, signal received.
//! - **Failures**: prepare, child and cleanup failures.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use routine::{Event, EventKind, Signal};
//!
//! let ev = Event::new(EventKind::SignalReceived).with_signal(Signal::INTERRUPT);
//!
//! assert_eq!(ev.kind, EventKind::SignalReceived);
//! assert_eq!(ev.signal, Some(Signal::INTERRUPT));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::signals::Signal;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of routine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle ===
    /// `execute` entered; prepare is about to run.
    RoutineStarting,

    /// Main executor and children launched.
    RoutineServing,

    /// The main executor returned.
    ///
    /// Sets:
    /// - `error`: failure message, if it failed
    MainExited,

    /// Every tracked task of the run finished.
    AllJoined,

    /// The run is over (cleanup done).
    ///
    /// Sets:
    /// - `error`: the run's failure message, if any
    RoutineStopped,

    // === Shutdown triggers ===
    /// [`Handle::stop`](crate::Handle::stop) was called.
    StopRequested,

    /// The run context was cancelled or hit its deadline.
    ///
    /// Sets:
    /// - `error`: the cancellation cause
    ContextDone,

    /// A subscribed signal was delivered and terminated the run.
    ///
    /// Sets:
    /// - `signal`: the delivered signal
    SignalReceived,

    /// A subscribed signal was delivered and every handler chose to continue.
    ///
    /// Sets:
    /// - `signal`: the delivered signal
    SignalIgnored,

    // === Failures ===
    /// Prepare failed; the run ends without launching anything.
    ///
    /// Sets:
    /// - `error`: failure message
    PrepareFailed,

    /// A declared child executor failed.
    ///
    /// Sets:
    /// - `child`: 0-based index of the child
    /// - `error`: failure message
    ChildFailed,

    /// Cleanup failed (logged, never returned).
    ///
    /// Sets:
    /// - `error`: failure message
    CleanupFailed,
}

impl EventKind {
    /// Returns a short stable label (kebab-case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::RoutineStarting => "starting",
            EventKind::RoutineServing => "serving",
            EventKind::MainExited => "main-exited",
            EventKind::AllJoined => "all-joined",
            EventKind::RoutineStopped => "stopped",
            EventKind::StopRequested => "stop-requested",
            EventKind::ContextDone => "context-done",
            EventKind::SignalReceived => "signal-received",
            EventKind::SignalIgnored => "signal-ignored",
            EventKind::PrepareFailed => "prepare-failed",
            EventKind::ChildFailed => "child-failed",
            EventKind::CleanupFailed => "cleanup-failed",
        }
    }
}

/// Routine event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Delivered signal, if applicable.
    pub signal: Option<Signal>,
    /// Index of the child executor, if applicable.
    pub child: Option<usize>,
    /// Human-readable error message, if applicable.
    pub error: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            signal: None,
            child: None,
            error: None,
        }
    }

    /// Attaches the delivered signal.
    #[inline]
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Attaches a child index.
    #[inline]
    pub fn with_child(mut self, index: usize) -> Self {
        self.child = Some(index);
        self
    }

    /// Attaches an error message.
    #[inline]
    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string().into());
        self
    }
}
