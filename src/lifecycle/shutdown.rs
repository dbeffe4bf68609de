//! Stop signal fanned out to the relay's long-running tasks.

use tokio::sync::broadcast;

/// One-shot stop signal.
///
/// `startup::run` fires it on SIGINT/SIGTERM; the HTTP server drains
/// in-flight image transfers when it arrives. Tests use it to stop a relay
/// started on an ephemeral port.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Firing with nobody listening is a no-op.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
