//! Log-only transport for local development.

use async_trait::async_trait;
use uuid::Uuid;

use crate::notification::{MessageId, NotificationMessage};

use super::{PushTransport, TransportError};

/// Writes each message to the log and reports it as sent
#[derive(Debug, Default)]
pub struct LogTransport;

impl LogTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushTransport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, message: &NotificationMessage) -> Result<MessageId, TransportError> {
        let message_id = MessageId::new(format!("log-{}", Uuid::new_v4()));

        tracing::info!(
            message_id = %message_id,
            event_id = %message.event_id,
            recipient = %message.recipient,
            title = %message.title,
            body = %message.body,
            data = ?message.data,
            priority = message.options.priority.as_str(),
            channel_id = %message.options.channel_id,
            "Push message (log transport)"
        );

        Ok(message_id)
    }
}
