use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::directory::LookupError;
use crate::transport::TransportError;

use super::MessageId;

/// Input rejected before any collaborator is called
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

/// Terminal result of handling one event
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The transport accepted the message
    Sent { message_id: MessageId },
    /// Lookups succeeded but there is legitimately nobody to notify
    Skipped(SkipReason),
    /// A collaborator failed; the caller decides whether to redeliver
    Failed(DeliveryFailure),
}

/// Why no delivery was attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    #[serde(rename = "no-target-device")]
    NoTargetDevice,
    #[serde(rename = "geofence-not-found")]
    GeofenceNotFound,
}

/// Pipeline stage a collaborator call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    UserDirectory,
    GeofenceStore,
    PushTransport,
}

/// Why a delivery attempt failed
#[derive(Debug, Error)]
pub enum DeliveryFailure {
    #[error("{collaborator} lookup failed: {error}")]
    Lookup {
        collaborator: &'static str,
        #[source]
        error: LookupError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("timeout")]
    Timeout { stage: Stage },
}

/// Classification of an outcome, independent of ids and error details
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Sent,
    Skipped,
    Failed,
}

impl DeliveryOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            DeliveryOutcome::Sent { .. } => OutcomeKind::Sent,
            DeliveryOutcome::Skipped(_) => OutcomeKind::Skipped,
            DeliveryOutcome::Failed(_) => OutcomeKind::Failed,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent { .. })
    }

    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            DeliveryOutcome::Sent { message_id } => Some(message_id),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            DeliveryOutcome::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&DeliveryFailure> {
        match self {
            DeliveryOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Sent { message_id } => write!(f, "sent({})", message_id),
            DeliveryOutcome::Skipped(reason) => write!(f, "skipped({})", reason),
            DeliveryOutcome::Failed(failure) => write!(f, "failed({})", failure),
        }
    }
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoTargetDevice => "no-target-device",
            SkipReason::GeofenceNotFound => "geofence-not-found",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::UserDirectory => "user-directory",
            Stage::GeofenceStore => "geofence-store",
            Stage::PushTransport => "push-transport",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DeliveryFailure {
    /// True when redelivering the event cannot help, e.g. an unregistered
    /// device token that should be cleaned up instead
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryFailure::Transport(e) if e.is_permanent())
    }

    pub fn is_retryable(&self) -> bool {
        !self.is_permanent()
    }

    /// Short machine-readable code for logs and API responses
    pub fn code(&self) -> &'static str {
        match self {
            DeliveryFailure::Lookup { .. } => "lookup_error",
            DeliveryFailure::Transport(TransportError::Permanent(_)) => "transport_permanent",
            DeliveryFailure::Transport(_) => "transport_error",
            DeliveryFailure::Timeout { .. } => "timeout",
        }
    }
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Sent => "sent",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Failed => "failed",
        }
    }
}
