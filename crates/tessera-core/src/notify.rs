//! The network collaborator seam.
//!
//! The core publishes [`Notification`]s to an injected sink. The sink is
//! called from the tick thread, so implementations must be cheap and must
//! not block; the usual implementation forwards into a channel that a
//! bridge task drains.

use tessera_types::Notification;
use tokio::sync::mpsc;
use tracing::warn;

/// Receives tile and actor-view notifications from the core.
pub trait NotificationSink: Send + Sync {
    /// Publish one notification.
    fn publish(&self, notification: Notification);
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn publish(&self, _notification: Notification) {}
}

/// Sink that forwards into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    /// Sending half; the bridge owns the receiver.
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Create a sink and the receiver the bridge should drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn publish(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            warn!("Notification bridge closed, dropping notification");
        }
    }
}
