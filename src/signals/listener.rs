//! # OS signal subscription.
//!
//! [`SignalSet`] holds one OS listener per distinct signal and yields them as they arrive.
//!
//! **Unix platforms:** any catchable signal via [`tokio::signal::unix::signal`].
//!
//! **Other platforms:** only [`Signal::INTERRUPT`] (Ctrl-C via [`tokio::signal::ctrl_c`]);
//! other signals are accepted and never delivered.

use std::io;

use crate::signals::Signal;

/// Listener for a set of signals.
pub struct SignalSet {
    signals: Vec<Signal>,
    #[cfg(unix)]
    streams: Vec<tokio::signal::unix::Signal>,
}

impl SignalSet {
    /// Subscribes to every distinct signal in `signals`.
    ///
    /// Fails if the OS refuses a subscription (e.g. `SIGKILL`).
    #[cfg(unix)]
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> io::Result<Self> {
        use tokio::signal::unix::signal;

        let signals = dedup(signals);
        let streams = signals
            .iter()
            .map(|sig| signal((*sig).into()))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Self { signals, streams })
    }

    /// Subscribes to every distinct signal in `signals`.
    #[cfg(not(unix))]
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> io::Result<Self> {
        Ok(Self {
            signals: dedup(signals),
        })
    }

    /// Subscribed signals.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Returns `true` if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Waits for the next delivered signal; `None` if nothing can ever be delivered.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> Option<Signal> {
        if self.streams.is_empty() {
            return None;
        }
        std::future::poll_fn(|cx| {
            let mut closed = 0;
            for (sig, stream) in self.signals.iter().zip(self.streams.iter_mut()) {
                match stream.poll_recv(cx) {
                    std::task::Poll::Ready(Some(())) => return std::task::Poll::Ready(Some(*sig)),
                    std::task::Poll::Ready(None) => closed += 1,
                    std::task::Poll::Pending => {}
                }
            }
            if closed == self.streams.len() {
                std::task::Poll::Ready(None)
            } else {
                std::task::Poll::Pending
            }
        })
        .await
    }

    /// Waits for the next delivered signal; `None` if nothing can ever be delivered.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Option<Signal> {
        if !self.signals.contains(&Signal::INTERRUPT) {
            return None;
        }
        tokio::signal::ctrl_c().await.ok()?;
        Some(Signal::INTERRUPT)
    }
}

fn dedup(signals: impl IntoIterator<Item = Signal>) -> Vec<Signal> {
    let mut out: Vec<Signal> = Vec::new();
    for sig in signals {
        if !out.contains(&sig) {
            out.push(sig);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_collapsed_in_order() {
        let sigs = dedup([Signal::TERMINATE, Signal::INTERRUPT, Signal::TERMINATE]);
        assert_eq!(sigs, vec![Signal::TERMINATE, Signal::INTERRUPT]);
    }

    #[tokio::test]
    async fn empty_set_never_delivers() {
        let mut set = SignalSet::new([]).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.recv().await, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unix_subscriptions_are_created() {
        let set = SignalSet::new([Signal::HANGUP, Signal::QUIT]).unwrap();
        assert_eq!(set.signals(), &[Signal::HANGUP, Signal::QUIT]);
    }
}
