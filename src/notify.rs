use tokio::sync::broadcast;

use crate::models::UserNotification;

const CHANNEL_CAPACITY: usize = 32;

/// Fan-out channel for user-visible notifications.
///
/// Keeps the dispatcher's core logic effect-free: it publishes here and
/// whoever renders toasts subscribes. Publishing never blocks and never
/// fails; with no subscribers the notification is simply dropped.
#[derive(Clone)]
pub struct NotificationSink {
    tx: broadcast::Sender<UserNotification>,
}

impl NotificationSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, notification: UserNotification) {
        tracing::info!(
            title = %notification.title,
            severity = ?notification.severity,
            "User notification"
        );
        let _ = self.tx.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UserNotification> {
        self.tx.subscribe()
    }
}

impl Default for NotificationSink {
    fn default() -> Self {
        Self::new()
    }
}
