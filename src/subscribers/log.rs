//! # LogWriter: events rendered through `tracing`.
//!
//! ## Example output (with the `fmt` subscriber)
//! ```text
//! INFO routine::subscribers::log: starting seq=0
//! INFO routine::subscribers::log: child-failed seq=3 child=1 error="execution failed: boom"
//! INFO routine::subscribers::log: signal-received seq=5 signal=SIGINT
//! INFO routine::subscribers::log: stopped seq=8
//! ```

use async_trait::async_trait;

use crate::events::Event;
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        tracing::info!(
            seq = e.seq,
            signal = e.signal.map(tracing::field::display),
            child = e.child,
            error = e.error.as_deref(),
            "{}",
            e.kind.as_label()
        );
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
