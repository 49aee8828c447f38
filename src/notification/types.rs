use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of trailing token characters kept when describing a device
const TOKEN_SUFFIX_LEN: usize = 6;

/// Where a notification is addressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Recipient {
    /// A single installed application instance
    Device { token: String },
    /// Every device subscribed to a named topic
    Topic { name: String },
}

impl Recipient {
    /// Address a device. Returns `None` for an empty or blank token.
    pub fn device(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Recipient::Device { token })
        }
    }

    /// Address a topic
    pub fn topic(name: impl Into<String>) -> Self {
        Recipient::Topic { name: name.into() }
    }

    pub fn is_topic(&self) -> bool {
        matches!(self, Recipient::Topic { .. })
    }

    /// Audit-friendly description; device tokens are truncated to a suffix
    pub fn describe(&self) -> String {
        match self {
            Recipient::Topic { name } => format!("topic:{}", name),
            Recipient::Device { token } => {
                let chars: Vec<char> = token.chars().collect();
                if chars.len() <= TOKEN_SUFFIX_LEN {
                    format!("device:{}", token)
                } else {
                    let suffix: String = chars[chars.len() - TOKEN_SUFFIX_LEN..].iter().collect();
                    format!("device:…{}", suffix)
                }
            }
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Delivery priority requested from the push platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

/// Platform delivery hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOptions {
    pub priority: Priority,
    /// Android notification channel the client registered
    pub channel_id: String,
    /// Whether the device should play its default sound
    pub sound: bool,
}

impl DeliveryOptions {
    pub fn new(priority: Priority, channel_id: impl Into<String>, sound: bool) -> Self {
        Self {
            priority,
            channel_id: channel_id.into(),
            sound,
        }
    }
}

/// Identifier returned by a push transport for an accepted message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform-agnostic push message.
///
/// Built once per event through [`NotificationMessageBuilder`] and not
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    /// Id of the event this message was shaped from; doubles as the
    /// transport collapse key
    pub event_id: String,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
    pub recipient: Recipient,
    pub options: DeliveryOptions,
}

impl NotificationMessage {
    pub fn builder(event_id: impl Into<String>, recipient: Recipient) -> NotificationMessageBuilder {
        NotificationMessageBuilder::new(event_id, recipient)
    }

    /// True when the message carries no display text at all
    pub fn is_data_only(&self) -> bool {
        self.title.is_empty() && self.body.is_empty()
    }
}

/// Builder for [`NotificationMessage`]
#[derive(Debug, Clone)]
pub struct NotificationMessageBuilder {
    event_id: String,
    title: String,
    body: String,
    data: BTreeMap<String, String>,
    recipient: Recipient,
    options: DeliveryOptions,
}

impl NotificationMessageBuilder {
    pub fn new(event_id: impl Into<String>, recipient: Recipient) -> Self {
        Self {
            event_id: event_id.into(),
            title: String::new(),
            body: String::new(),
            data: BTreeMap::new(),
            recipient,
            options: DeliveryOptions::new(Priority::Normal, String::new(), false),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Add one structured data field
    pub fn data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn options(mut self, options: DeliveryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> NotificationMessage {
        NotificationMessage {
            event_id: self.event_id,
            title: self.title,
            body: self.body,
            data: self.data,
            recipient: self.recipient,
            options: self.options,
        }
    }
}
