//! Shutdown coordination.

use tokio::sync::broadcast;

use crate::lifecycle::signals::wait_for_termination;

/// Broadcasts a single "stop now" event to every subscribed server.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for the shutdown event. Subscribe before triggering.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the shutdown event. Returns the number of receivers notified.
    pub fn trigger(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }

    /// Trigger shutdown on the first SIGINT or SIGTERM.
    pub fn spawn_signal_listener(&self) -> tokio::task::JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            wait_for_termination().await;
            let notified = shutdown.trigger();
            tracing::info!(receivers = notified, "Shutdown triggered");
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
