//! Best-effort "data changed" notifications from ingestion to the notifier.

use std::time::Duration;
use tokio::sync::mpsc;

/// Default time a signal waits for the notifier to accept it.
pub const DEFAULT_RELOAD_GRACE: Duration = Duration::from_secs(3);

/// Sending side of the reload channel.
///
/// Signals are never queued beyond one: while a reload is already pending a
/// new signal waits for at most the grace period and is then dropped.
#[derive(Debug, Clone)]
pub struct ChangeSignal {
    tx: mpsc::Sender<()>,
    grace: Duration,
}

impl ChangeSignal {
    /// Create a signal and the receiver the notifier listens on.
    pub fn channel(grace: Duration) -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx, grace }, rx)
    }

    /// Tell the notifier that stored data changed.
    ///
    /// Returns immediately; delivery happens on a spawned task, so this must
    /// be called from within a Tokio runtime.
    pub fn data_changed(&self) {
        let tx = self.tx.clone();
        let grace = self.grace;
        tokio::spawn(async move {
            if let Err(e) = tx.send_timeout((), grace).await {
                tracing::debug!("reload signal dropped: {}", e);
            }
        });
    }
}
