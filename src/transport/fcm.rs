//! Firebase Cloud Messaging HTTP v1 transport.
//!
//! Sends `POST {endpoint}/v1/projects/{project_id}/messages:send` with a
//! pre-issued bearer token. The platform's message name is returned as the
//! message id.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::FcmConfig;
use crate::notification::{MessageId, NotificationMessage, Priority, Recipient};

use super::{PushTransport, TransportError};

/// Android notification priorities
const NOTIFICATION_PRIORITY_MAX: &str = "PRIORITY_MAX";
const NOTIFICATION_PRIORITY_DEFAULT: &str = "PRIORITY_DEFAULT";

/// FCM error codes that will never succeed on retry
const PERMANENT_ERROR_CODES: &[&str] = &["UNREGISTERED", "INVALID_ARGUMENT", "SENDER_ID_MISMATCH"];

/// Push transport backed by the FCM HTTP v1 API
pub struct FcmTransport {
    client: Client,
    send_url: String,
    access_token: String,
}

impl FcmTransport {
    pub fn new(config: FcmConfig) -> Result<Self, TransportError> {
        if config.project_id.trim().is_empty() {
            return Err(TransportError::Misconfigured(
                "transport.fcm.project_id is required".to_string(),
            ));
        }
        if config.access_token.trim().is_empty() {
            return Err(TransportError::Misconfigured(
                "transport.fcm.access_token is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let send_url = format!(
            "{}/v1/projects/{}/messages:send",
            config.endpoint.trim_end_matches('/'),
            config.project_id
        );

        Ok(Self {
            client,
            send_url,
            access_token: config.access_token,
        })
    }

    pub fn send_url(&self) -> &str {
        &self.send_url
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    fn name(&self) -> &'static str {
        "fcm"
    }

    #[tracing::instrument(
        name = "fcm.deliver",
        skip(self, message),
        fields(event_id = %message.event_id, recipient = %message.recipient)
    )]
    async fn deliver(&self, message: &NotificationMessage) -> Result<MessageId, TransportError> {
        let request = SendRequest {
            message: FcmMessage::from_notification(message),
        };

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: SendResponse = response.json().await?;
            return Ok(MessageId::new(body.name));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }
}

/// Map a non-success response to a transient or permanent error
fn classify_failure(status: StatusCode, body: &str) -> TransportError {
    let error_code = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error.error_code());

    let detail = match &error_code {
        Some(code) => format!("{} {}", status.as_u16(), code),
        None => format!("{} {}", status.as_u16(), body.chars().take(200).collect::<String>()),
    };

    let permanent = status == StatusCode::NOT_FOUND
        || error_code
            .as_deref()
            .is_some_and(|code| PERMANENT_ERROR_CODES.contains(&code));

    if permanent {
        TransportError::Permanent(detail)
    } else {
        TransportError::Transient(detail)
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Debug, Serialize)]
struct FcmMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification: Option<FcmNotification<'a>>,
    data: &'a BTreeMap<String, String>,
    android: AndroidConfig<'a>,
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct AndroidConfig<'a> {
    priority: &'static str,
    collapse_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification: Option<AndroidNotification<'a>>,
}

#[derive(Debug, Serialize)]
struct AndroidNotification<'a> {
    channel_id: &'a str,
    default_sound: bool,
    notification_priority: &'static str,
}

impl<'a> FcmMessage<'a> {
    fn from_notification(message: &'a NotificationMessage) -> Self {
        let (token, topic) = match &message.recipient {
            Recipient::Device { token } => (Some(token.as_str()), None),
            Recipient::Topic { name } => (None, Some(name.as_str())),
        };

        let notification = if message.is_data_only() {
            None
        } else {
            Some(FcmNotification {
                title: &message.title,
                body: &message.body,
            })
        };

        let android_notification = notification.as_ref().map(|_| AndroidNotification {
            channel_id: &message.options.channel_id,
            default_sound: message.options.sound,
            notification_priority: match message.options.priority {
                Priority::High => NOTIFICATION_PRIORITY_MAX,
                Priority::Normal => NOTIFICATION_PRIORITY_DEFAULT,
            },
        });

        Self {
            token,
            topic,
            notification,
            data: &message.data,
            android: AndroidConfig {
                priority: match message.options.priority {
                    Priority::High => "HIGH",
                    Priority::Normal => "NORMAL",
                },
                collapse_key: &message.event_id,
                notification: android_notification,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(default)]
    error_code: Option<String>,
}

impl ErrorBody {
    /// FCM-specific code from details, falling back to the RPC status
    fn error_code(self) -> Option<String> {
        self.details
            .into_iter()
            .find_map(|d| d.error_code)
            .or(self.status)
    }
}
