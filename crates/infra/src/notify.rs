//! Broadcast-channel notification bus.
//!
//! Publishing is fire-and-forget: a slow or absent subscriber never blocks
//! or fails the sync path.

use jobtrail_core::NotificationBus;
use jobtrail_domain::Notification;
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 64;

/// `NotificationBus` backed by a tokio broadcast channel.
pub struct BroadcastNotificationBus {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// New receiver observing every notification published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl NotificationBus for BroadcastNotificationBus {
    fn publish(&self, notification: Notification) {
        // send only errors when there are no receivers; that is fine.
        if self.tx.send(notification).is_err() {
            debug!("notification dropped: no active subscribers");
        }
    }
}
