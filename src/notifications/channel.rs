use super::events::{ChannelKind, Notification};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Recipient {recipient_id} is unreachable on {channel:?}")]
    Unreachable {
        recipient_id: String,
        channel: ChannelKind,
    },

    #[error("Channel {channel:?} rejected notification: {reason}")]
    Rejected { channel: ChannelKind, reason: String },
}

/// Outbound delivery for notifications. Implementations must not assume
/// they are awaited by the operation that produced the notification.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Writes notifications to the log; the default in-app channel.
#[derive(Debug, Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::InApp
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        info!(
            recipient = %notification.recipient_id,
            workflow_id = %notification.workflow_id,
            kind = ?notification.kind,
            "{}",
            notification.message
        );
        Ok(())
    }
}
