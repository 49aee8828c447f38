//! In-memory transport that records delivered messages.
//!
//! Meant for tests and local runs. Only the most recent messages are kept.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::notification::{MessageId, NotificationMessage};

use super::{PushTransport, TransportError};

/// Number of messages retained by [`MemoryTransport::new`]
pub const DEFAULT_RETAINED: usize = 1_000;

/// Records delivered messages instead of sending them
#[derive(Debug)]
pub struct MemoryTransport {
    delivered: RwLock<VecDeque<(MessageId, NotificationMessage)>>,
    capacity: usize,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RETAINED)
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` messages; older ones are evicted first
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            delivered: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Messages delivered so far, oldest first
    pub async fn delivered(&self) -> Vec<NotificationMessage> {
        self.delivered
            .read()
            .await
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub async fn delivered_count(&self) -> usize {
        self.delivered.read().await.len()
    }

    /// Message recorded under a given id
    pub async fn find(&self, message_id: &MessageId) -> Option<NotificationMessage> {
        self.delivered
            .read()
            .await
            .iter()
            .find(|(id, _)| id == message_id)
            .map(|(_, message)| message.clone())
    }

    pub async fn clear(&self) {
        self.delivered.write().await.clear();
    }
}

#[async_trait]
impl PushTransport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn deliver(&self, message: &NotificationMessage) -> Result<MessageId, TransportError> {
        let message_id = MessageId::new(Uuid::new_v4().to_string());
        {
            let mut delivered = self.delivered.write().await;
            if delivered.len() >= self.capacity {
                delivered.pop_front();
            }
            delivered.push_back((message_id.clone(), message.clone()));
        }

        tracing::debug!(
            message_id = %message_id,
            event_id = %message.event_id,
            recipient = %message.recipient,
            "Recorded push message"
        );

        Ok(message_id)
    }
}
