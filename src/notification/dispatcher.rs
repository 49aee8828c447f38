use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::DispatcherConfig;
use crate::directory::{Directory, GeofenceStore, UserDirectory};
use crate::event::{DomainEvent, EventKind, GeofenceCrossing, IncidentReport};
use crate::metrics::DispatchMetrics;
use crate::transport::PushTransport;

use super::{
    DeliveryFailure, DeliveryOutcome, DispatchError, MessageShaper, NotificationMessage, Recipient,
    SkipReason, Stage,
};

/// Statistics for the notification dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Events handed to `handle`, valid or not
    pub events_received: AtomicU64,
    /// Events rejected by validation
    pub invalid: AtomicU64,
    pub sent: AtomicU64,
    pub skipped: AtomicU64,
    pub failed: AtomicU64,
    /// Valid incident events
    pub incidents: AtomicU64,
    /// Valid geofence crossing events
    pub geofence_crossings: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            incidents: self.incidents.load(Ordering::Relaxed),
            geofence_crossings: self.geofence_crossings.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub events_received: u64,
    pub invalid: u64,
    pub sent: u64,
    pub skipped: u64,
    pub failed: u64,
    pub incidents: u64,
    pub geofence_crossings: u64,
}

/// Turns domain events into push deliveries.
///
/// Each call to [`handle`](Self::handle) is independent: it resolves the
/// recipient, shapes one message, makes at most one delivery attempt and
/// reports a terminal outcome. Nothing is retried or persisted here.
pub struct NotificationDispatcher {
    users: Arc<dyn UserDirectory>,
    geofences: Arc<dyn GeofenceStore>,
    transport: Arc<dyn PushTransport>,
    shaper: MessageShaper,
    timeout: Duration,
    stats: DispatcherStats,
}

impl NotificationDispatcher {
    pub fn new(
        config: &DispatcherConfig,
        users: Arc<dyn UserDirectory>,
        geofences: Arc<dyn GeofenceStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            users,
            geofences,
            transport,
            shaper: MessageShaper::new(config),
            timeout: config.collaborator_timeout(),
            stats: DispatcherStats::default(),
        }
    }

    /// Create a dispatcher from a configured directory pair
    pub fn from_directory(
        config: &DispatcherConfig,
        directory: Directory,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self::new(config, directory.users, directory.geofences, transport)
    }

    /// Replace the message shaper (custom catalog, etc.)
    pub fn with_shaper(mut self, shaper: MessageShaper) -> Self {
        self.shaper = shaper;
        self
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Bound applied to every collaborator call
    pub fn collaborator_timeout(&self) -> Duration {
        self.timeout
    }

    /// Handle one domain event.
    ///
    /// Returns `Err` only for events that fail validation. Every other
    /// result, including collaborator failures, is a [`DeliveryOutcome`].
    #[tracing::instrument(
        name = "dispatcher.handle",
        skip(self, event),
        fields(event_id = %event.id, event_kind = event.kind_name())
    )]
    pub async fn handle(&self, event: &DomainEvent) -> Result<DeliveryOutcome, DispatchError> {
        let started = Instant::now();
        let kind = event.kind_name();

        self.stats.events_received.fetch_add(1, Ordering::Relaxed);
        DispatchMetrics::record_received(kind);

        if let Err(reason) = event.validate() {
            self.stats.invalid.fetch_add(1, Ordering::Relaxed);
            DispatchMetrics::record_invalid(kind);
            tracing::warn!(
                event_id = %event.id,
                event_kind = kind,
                outcome = "invalid",
                reason = %reason,
                "Rejected invalid event"
            );
            return Err(DispatchError::InvalidEvent(reason));
        }

        let (recipient, outcome) = match &event.kind {
            EventKind::IncidentCreated(report) => {
                self.stats.incidents.fetch_add(1, Ordering::Relaxed);
                self.handle_incident(&event.id, report).await
            }
            EventKind::GeofenceCrossed(crossing) => {
                self.stats.geofence_crossings.fetch_add(1, Ordering::Relaxed);
                self.handle_geofence(&event.id, crossing).await
            }
        };

        self.record_outcome(event, &recipient, &outcome);
        DispatchMetrics::observe_handle(started.elapsed());

        Ok(outcome)
    }

    async fn handle_incident(&self, event_id: &str, report: &IncidentReport) -> (String, DeliveryOutcome) {
        tracing::debug!(stage = "shaping", incident_type = %report.incident_type, "Shaping incident broadcast");
        let message = self.shaper.shape_incident(event_id, report);
        let recipient = message.recipient.describe();

        (recipient, self.deliver(&message).await)
    }

    async fn handle_geofence(&self, event_id: &str, crossing: &GeofenceCrossing) -> (String, DeliveryOutcome) {
        let unresolved = format!("user:{}", crossing.user_id);

        tracing::debug!(
            stage = "resolving",
            user_id = %crossing.user_id,
            geofence_id = %crossing.geofence_id,
            "Resolving geofence recipient"
        );

        let token = match self
            .bounded(Stage::UserDirectory, self.users.lookup_token(&crossing.user_id))
            .await
        {
            Ok(Ok(token)) => token,
            Ok(Err(error)) => {
                let failure = DeliveryFailure::Lookup {
                    collaborator: self.users.name(),
                    error,
                };
                return (unresolved, DeliveryOutcome::Failed(failure));
            }
            Err(failure) => return (unresolved, DeliveryOutcome::Failed(failure)),
        };

        let Some(recipient) = token.and_then(Recipient::device) else {
            return (unresolved, DeliveryOutcome::Skipped(SkipReason::NoTargetDevice));
        };
        let described = recipient.describe();

        let geofence = match self
            .bounded(Stage::GeofenceStore, self.geofences.lookup_geofence(&crossing.geofence_id))
            .await
        {
            Ok(Ok(Some(geofence))) => geofence,
            Ok(Ok(None)) => return (described, DeliveryOutcome::Skipped(SkipReason::GeofenceNotFound)),
            Ok(Err(error)) => {
                let failure = DeliveryFailure::Lookup {
                    collaborator: self.geofences.name(),
                    error,
                };
                return (described, DeliveryOutcome::Failed(failure));
            }
            Err(failure) => return (described, DeliveryOutcome::Failed(failure)),
        };

        tracing::debug!(stage = "shaping", crossing_kind = crossing.crossing_kind.as_str(), "Shaping geofence message");
        let message = self.shaper.shape_geofence(event_id, crossing, &geofence, recipient);

        (described, self.deliver(&message).await)
    }

    async fn deliver(&self, message: &NotificationMessage) -> DeliveryOutcome {
        tracing::debug!(stage = "delivering", transport = self.transport.name(), "Delivering push message");

        match self.bounded(Stage::PushTransport, self.transport.deliver(message)).await {
            Ok(Ok(message_id)) => DeliveryOutcome::Sent { message_id },
            Ok(Err(error)) => DeliveryOutcome::Failed(DeliveryFailure::Transport(error)),
            Err(failure) => DeliveryOutcome::Failed(failure),
        }
    }

    /// Run a collaborator call under the configured timeout
    async fn bounded<T>(&self, stage: Stage, call: impl Future<Output = T>) -> Result<T, DeliveryFailure> {
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, call).await;
        DispatchMetrics::observe_stage(stage.as_str(), started.elapsed());

        result.map_err(|_| DeliveryFailure::Timeout { stage })
    }

    /// Emit the single log entry for a terminal outcome and count it
    fn record_outcome(&self, event: &DomainEvent, recipient: &str, outcome: &DeliveryOutcome) {
        let kind = event.kind_name();

        match outcome {
            DeliveryOutcome::Sent { message_id } => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                DispatchMetrics::record_sent(kind);
                tracing::info!(
                    event_id = %event.id,
                    event_kind = kind,
                    recipient = %recipient,
                    outcome = "sent",
                    message_id = %message_id,
                    "Notification sent"
                );
            }
            DeliveryOutcome::Skipped(reason) => {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                DispatchMetrics::record_skipped(kind, reason.as_str());
                tracing::info!(
                    event_id = %event.id,
                    event_kind = kind,
                    recipient = %recipient,
                    outcome = "skipped",
                    reason = %reason,
                    "Notification skipped"
                );
            }
            DeliveryOutcome::Failed(failure) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                DispatchMetrics::record_failed(kind, failure.code());
                if failure.is_permanent() {
                    tracing::warn!(
                        event_id = %event.id,
                        event_kind = kind,
                        recipient = %recipient,
                        outcome = "failed",
                        code = failure.code(),
                        error = %failure,
                        "Notification rejected permanently"
                    );
                } else {
                    tracing::error!(
                        event_id = %event.id,
                        event_kind = kind,
                        recipient = %recipient,
                        outcome = "failed",
                        code = failure.code(),
                        error = %failure,
                        "Notification delivery failed"
                    );
                }
            }
        }
    }
}
