use agrirent_core::{Notification, Notifier, NotifyError};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Notification emitter backed by a broadcast channel.
///
/// Downstream delivery workers (mail, push, in-app feed) subscribe to the
/// receiver side. Having no subscribers is not a delivery failure; the
/// message is still logged.
pub struct ChannelNotifier {
    tx: broadcast::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Notification>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %notification.recipient_id,
            kind = ?notification.kind,
            "Dispatching notification"
        );
        if self.tx.send(notification).is_err() {
            tracing::debug!("No notification subscribers connected");
        }
        Ok(())
    }
}
