//! Push delivery collaborators.
//!
//! A [`PushTransport`] hands a shaped [`NotificationMessage`] to a push
//! platform. Implementations must treat topic and device recipients as
//! distinct delivery modes.
//!
//! - `FcmTransport`: Firebase Cloud Messaging HTTP v1 API
//! - `LogTransport`: logs messages instead of sending them (development)
//! - `MemoryTransport`: records messages in memory
//!
//! Use [`create_transport`] to build the configured backend.

mod fcm;
mod log;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TransportConfig;
use crate::notification::{MessageId, NotificationMessage};

pub use self::fcm::FcmTransport;
pub use self::log::LogTransport;
pub use self::memory::MemoryTransport;

/// Errors from a delivery attempt
#[derive(Debug, Error)]
pub enum TransportError {
    /// Temporary failure; redelivering the event may succeed
    #[error("Transient delivery failure: {0}")]
    Transient(String),

    /// The platform rejected the message for good (e.g. unregistered token)
    #[error("Permanent delivery failure: {0}")]
    Permanent(String),

    /// HTTP client error (connect, timeout, body decode)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport is not usable with the current configuration
    #[error("Transport misconfigured: {0}")]
    Misconfigured(String),
}

impl TransportError {
    /// Whether retrying the same message can never succeed
    pub fn is_permanent(&self) -> bool {
        matches!(self, TransportError::Permanent(_))
    }
}

/// Delivers notification messages to a push platform
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Name used in logs and health output
    fn name(&self) -> &'static str;

    /// Deliver one message, returning the platform's message id
    async fn deliver(&self, message: &NotificationMessage) -> Result<MessageId, TransportError>;
}

/// Create a push transport based on configuration.
///
/// - `"fcm"`: Firebase Cloud Messaging (falls back to `log` if the HTTP
///   client cannot be built)
/// - `"memory"`: in-memory recorder
/// - `"log"` (default): log-only
pub fn create_transport(config: &TransportConfig) -> Arc<dyn PushTransport> {
    match config.backend.as_str() {
        "fcm" => match FcmTransport::new(config.fcm.clone()) {
            Ok(transport) => {
                tracing::info!(project_id = %config.fcm.project_id, "Using FCM push transport");
                Arc::new(transport)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create FCM transport, falling back to log transport");
                Arc::new(LogTransport::new())
            }
        },
        "memory" => {
            tracing::info!("Using in-memory push transport");
            Arc::new(MemoryTransport::new())
        }
        backend => {
            if backend != "log" {
                tracing::warn!(backend = %backend, "Unknown transport backend, using log transport");
            } else {
                tracing::info!("Using log-only push transport");
            }
            Arc::new(LogTransport::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FcmConfig;

    #[test]
    fn test_permanent_classification() {
        assert!(TransportError::Permanent("UNREGISTERED".into()).is_permanent());
        assert!(!TransportError::Transient("503".into()).is_permanent());
        assert!(!TransportError::Misconfigured("no project".into()).is_permanent());
    }

    #[test]
    fn test_create_transport_by_backend() {
        let mut config = TransportConfig::default();
        assert_eq!(create_transport(&config).name(), "log");

        config.backend = "memory".to_string();
        assert_eq!(create_transport(&config).name(), "memory");

        config.backend = "fcm".to_string();
        config.fcm = FcmConfig {
            project_id: "demo".to_string(),
            access_token: "token".to_string(),
            ..FcmConfig::default()
        };
        assert_eq!(create_transport(&config).name(), "fcm");

        config.backend = "carrier-pigeon".to_string();
        assert_eq!(create_transport(&config).name(), "log");
    }
}
