use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::event::DomainEvent;
use crate::metrics::TriggerMetrics;
use crate::notification::{DeliveryOutcome, OutcomeKind, SkipReason};
use crate::server::AppState;

const SOURCE: &str = "http";

/// Outcome of handling one event, as returned to the caller
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub event_id: String,
    pub outcome: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    /// Redelivering the same event may succeed
    pub retryable: bool,
    /// The recipient should be cleaned up instead of retried
    pub permanent: bool,
    pub timestamp: DateTime<Utc>,
}

impl EventResponse {
    fn from_outcome(event_id: String, outcome: &DeliveryOutcome) -> Self {
        let failure = outcome.failure();
        Self {
            event_id,
            outcome: outcome.kind(),
            message_id: outcome.message_id().map(|id| id.to_string()),
            reason: outcome.skip_reason(),
            error: failure.map(|f| f.to_string()),
            code: failure.map(|f| f.code()),
            retryable: failure.is_some_and(|f| f.is_retryable()),
            permanent: failure.is_some_and(|f| f.is_permanent()),
            timestamp: Utc::now(),
        }
    }
}

/// Status code for a terminal outcome.
///
/// Transient failures answer 503 so at-least-once callers redeliver;
/// permanent ones answer 422 so they stop.
fn status_for(outcome: &DeliveryOutcome) -> StatusCode {
    match outcome.failure() {
        None => StatusCode::OK,
        Some(failure) if failure.is_permanent() => StatusCode::UNPROCESSABLE_ENTITY,
        Some(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Accept one domain event and dispatch it synchronously
pub async fn receive_event(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DomainEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<EventResponse>)> {
    let Json(event) = payload.map_err(|rejection| {
        TriggerMetrics::record_rejected(SOURCE);
        match &rejection {
            JsonRejection::JsonSyntaxError(_) | JsonRejection::JsonDataError(_) => {
                AppError::Validation(rejection.body_text())
            }
            // 413 and 415 rejections keep their status
            _ => AppError::Rejected {
                status: rejection.status(),
                message: rejection.body_text(),
            },
        }
    })?;
    TriggerMetrics::record_accepted(SOURCE);

    let outcome = state.dispatcher.handle(&event).await?;
    let status = status_for(&outcome);

    Ok((status, Json(EventResponse::from_outcome(event.id, &outcome))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{DeliveryFailure, MessageId, Stage};
    use crate::transport::TransportError;

    #[test]
    fn test_status_mapping() {
        let sent = DeliveryOutcome::Sent {
            message_id: MessageId::new("m1"),
        };
        assert_eq!(status_for(&sent), StatusCode::OK);

        let skipped = DeliveryOutcome::Skipped(SkipReason::NoTargetDevice);
        assert_eq!(status_for(&skipped), StatusCode::OK);

        let timeout = DeliveryOutcome::Failed(DeliveryFailure::Timeout {
            stage: Stage::UserDirectory,
        });
        assert_eq!(status_for(&timeout), StatusCode::SERVICE_UNAVAILABLE);

        let permanent = DeliveryOutcome::Failed(TransportError::Permanent("UNREGISTERED".into()).into());
        assert_eq!(status_for(&permanent), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_response_body_for_skip() {
        let outcome = DeliveryOutcome::Skipped(SkipReason::GeofenceNotFound);
        let body = serde_json::to_value(EventResponse::from_outcome("e1".into(), &outcome)).unwrap();

        assert_eq!(body["event_id"], "e1");
        assert_eq!(body["outcome"], "skipped");
        assert_eq!(body["reason"], "geofence-not-found");
        assert_eq!(body["retryable"], false);
        assert!(body.get("error").is_none());
    }
}
