use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a notification is about, so clients can route/render it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    BookingCreated,
    HandoverVerified,
    ReturnConfirmed,
    DamageReported,
    BookingCompleted,
    BookingCancelled,
    ReviewRequested,
}

/// A single fire-and-forget message to one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub message: String,
    pub link: String,
}

/// Side-channel the state machine emits into on every transition.
///
/// Delivery is best-effort: the booking service logs failures and never
/// rolls a committed transition back because a notification did not go out.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);
