use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinSet};

use crate::config::RedisConfig;
use crate::event::DomainEvent;
use crate::metrics::TriggerMetrics;
use crate::notification::{DeliveryOutcome, NotificationDispatcher};
use crate::redis::{BackoffConfig, ExponentialBackoff};

const SOURCE: &str = "redis";

/// Redis Pub/Sub event source.
///
/// Every message on the configured channels is parsed as a [`DomainEvent`]
/// and handed to the dispatcher on its own task. Outcomes are logged by the
/// dispatcher; nothing is published back.
pub struct RedisSubscriber {
    config: RedisConfig,
    dispatcher: Arc<NotificationDispatcher>,
    backoff: BackoffConfig,
    shutdown: broadcast::Sender<()>,
}

impl RedisSubscriber {
    /// Create a new Redis subscriber
    pub fn new(config: RedisConfig, dispatcher: Arc<NotificationDispatcher>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            config,
            dispatcher,
            backoff: BackoffConfig::default(),
            shutdown,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Get a shutdown signal sender
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Run until a shutdown signal arrives, reconnecting on errors
    pub async fn start(&self) -> anyhow::Result<()> {
        let channels = self.config.event_channels();
        tracing::info!(
            channels = ?channels,
            max_in_flight = self.config.max_in_flight,
            "Starting Redis subscriber"
        );

        let mut backoff = ExponentialBackoff::with_config(self.backoff.clone());
        let mut shutdown_rx = self.shutdown.subscribe();
        // Outlives individual connections so a reconnect never aborts events.
        let mut in_flight = InFlight::new(self.config.max_in_flight);

        loop {
            match self
                .run_subscription_loop(&channels, &mut backoff, &mut in_flight)
                .await
            {
                Ok(()) => {
                    tracing::info!("Redis subscriber stopped gracefully");
                    break;
                }
                Err(e) => {
                    TriggerMetrics::set_subscriber_connected(false);
                    TriggerMetrics::record_reconnection();
                    let delay = backoff.next_delay();
                    tracing::error!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Redis subscription error, reconnecting"
                    );

                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            tracing::info!("Shutdown requested while waiting to reconnect");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        TriggerMetrics::set_subscriber_connected(false);

        if !in_flight.is_empty() {
            tracing::info!(pending = in_flight.len(), "Waiting for in-flight events");
        }
        in_flight.drain().await;
        Ok(())
    }

    async fn run_subscription_loop(
        &self,
        channels: &[String],
        backoff: &mut ExponentialBackoff,
        in_flight: &mut InFlight,
    ) -> anyhow::Result<()> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        for channel in channels {
            if is_pattern(channel) {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        tracing::info!("Redis subscription established");
        TriggerMetrics::set_subscriber_connected(true);
        backoff.reset();

        let mut message_stream = pubsub.on_message();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Received shutdown signal");
                    return Ok(());
                }
                msg = message_stream.next() => {
                    let Some(msg) = msg else {
                        anyhow::bail!("Redis message stream ended");
                    };

                    let channel = msg.get_channel_name().to_string();
                    let payload = match msg.get_payload::<String>() {
                        Ok(payload) => payload,
                        Err(e) => {
                            TriggerMetrics::record_rejected(SOURCE);
                            tracing::warn!(error = %e, channel = %channel, "Failed to get message payload");
                            continue;
                        }
                    };

                    if let Some(event) = accept(&channel, &payload) {
                        in_flight
                            .spawn(dispatch(self.dispatcher.clone(), channel, event))
                            .await;
                    }
                }
            }
        }
    }
}

/// Parse one Pub/Sub payload, logging and counting rejects
fn accept(channel: &str, payload: &str) -> Option<DomainEvent> {
    tracing::debug!(channel = %channel, "Received Redis message");

    match parse_event(payload) {
        Ok(event) => {
            TriggerMetrics::record_accepted(SOURCE);
            Some(event)
        }
        Err(e) => {
            TriggerMetrics::record_rejected(SOURCE);
            tracing::warn!(
                error = %e,
                channel = %channel,
                payload = %payload,
                "Failed to parse Redis event"
            );
            None
        }
    }
}

async fn dispatch(dispatcher: Arc<NotificationDispatcher>, channel: String, event: DomainEvent) {
    // The dispatcher logs every outcome; only the retry hint is added here.
    if let Ok(DeliveryOutcome::Failed(failure)) = dispatcher.handle(&event).await {
        if failure.is_retryable() {
            tracing::debug!(
                event_id = %event.id,
                channel = %channel,
                "Pub/Sub events are not redelivered; publisher must resend"
            );
        }
    }
}

/// Event tasks spawned by the subscriber, capped at `limit` running at once
struct InFlight {
    tasks: JoinSet<()>,
    limit: usize,
}

impl InFlight {
    fn new(limit: usize) -> Self {
        Self {
            tasks: JoinSet::new(),
            limit: limit.max(1),
        }
    }

    /// Spawn `task`, first waiting for a free slot when the cap is reached
    async fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        while let Some(result) = self.tasks.try_join_next() {
            log_join(result);
        }
        while self.tasks.len() >= self.limit {
            match self.tasks.join_next().await {
                Some(result) => log_join(result),
                None => break,
            }
        }
        self.tasks.spawn(task);
    }

    async fn drain(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            log_join(result);
        }
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Event task failed");
    }
}

/// Channel names containing glob characters are subscribed with PSUBSCRIBE
fn is_pattern(channel: &str) -> bool {
    channel.contains(['*', '?', '['])
}

fn parse_event(payload: &str) -> Result<DomainEvent, serde_json::Error> {
    serde_json::from_str(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::config::DispatcherConfig;
    use crate::directory::{LookupError, MemoryGeofenceStore, UserDirectory};
    use crate::event::{CrossingKind, EventKind, GeofenceCrossing, IncidentReport, IncidentType};
    use crate::transport::MemoryTransport;

    struct StalledUsers;

    #[async_trait]
    impl UserDirectory for StalledUsers {
        async fn lookup_token(&self, _user_id: &str) -> Result<Option<String>, LookupError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    fn stalling_dispatcher(transport: Arc<MemoryTransport>) -> Arc<NotificationDispatcher> {
        let config = DispatcherConfig {
            collaborator_timeout_ms: 30_000,
            ..DispatcherConfig::default()
        };
        Arc::new(NotificationDispatcher::new(
            &config,
            Arc::new(StalledUsers),
            Arc::new(MemoryGeofenceStore::new()),
            transport,
        ))
    }

    fn stalled_event() -> DomainEvent {
        DomainEvent::geofence("slow", GeofenceCrossing::new("u1", "g1", CrossingKind::Enter))
    }

    fn incident_event() -> DomainEvent {
        DomainEvent::incident("fast", IncidentReport::new(IncidentType::Fire, 1.0, 2.0))
    }

    #[tokio::test]
    async fn test_stalled_event_does_not_delay_later_events() {
        let transport = Arc::new(MemoryTransport::new());
        let dispatcher = stalling_dispatcher(transport.clone());
        let mut in_flight = InFlight::new(4);

        in_flight
            .spawn(dispatch(dispatcher.clone(), "harkai:events".into(), stalled_event()))
            .await;
        in_flight
            .spawn(dispatch(dispatcher.clone(), "harkai:events".into(), incident_event()))
            .await;

        let delivered = tokio::time::timeout(Duration::from_secs(2), async {
            while transport.delivered_count().await == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        assert!(delivered.is_ok(), "incident waited behind the stalled lookup");
        assert_eq!(transport.delivered().await[0].data["type"], "fire");
    }

    #[tokio::test]
    async fn test_in_flight_cap_applies_backpressure() {
        let transport = Arc::new(MemoryTransport::new());
        let dispatcher = stalling_dispatcher(transport.clone());
        let mut in_flight = InFlight::new(1);

        in_flight
            .spawn(dispatch(dispatcher.clone(), "harkai:events".into(), stalled_event()))
            .await;
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            in_flight.spawn(dispatch(dispatcher.clone(), "harkai:events".into(), incident_event())),
        )
        .await;

        assert!(second.is_err());
        assert_eq!(in_flight.len(), 1);
        assert_eq!(transport.delivered_count().await, 0);
    }

    #[tokio::test]
    async fn test_drain_waits_for_running_events() {
        let transport = Arc::new(MemoryTransport::new());
        let dispatcher = stalling_dispatcher(transport.clone());
        let mut in_flight = InFlight::new(0);

        in_flight
            .spawn(dispatch(dispatcher, "harkai:events".into(), incident_event()))
            .await;
        in_flight.drain().await;

        assert!(in_flight.is_empty());
        assert_eq!(transport.delivered_count().await, 1);
    }

    #[test]
    fn test_accept_rejects_malformed_payload() {
        assert!(accept("harkai:events", "{not json").is_none());
        let payload = r#"{"id": "e1", "kind": "incidentCreated", "latitude": 0.0, "longitude": 0.0}"#;
        assert!(accept("harkai:events", payload).is_some());
    }

    #[test]
    fn test_pattern_detection() {
        assert!(is_pattern("harkai:*"));
        assert!(is_pattern("events:?"));
        assert!(is_pattern("events:[ab]"));
        assert!(!is_pattern("harkai:events"));
    }

    #[test]
    fn test_parse_geofence_event() {
        let payload = r#"{
            "id": "evt-1",
            "kind": "geofenceCrossed",
            "userId": "u1",
            "geofenceId": "g1",
            "crossingKind": "exit"
        }"#;

        let event = parse_event(payload).unwrap();
        match event.kind {
            EventKind::GeofenceCrossed(crossing) => {
                assert_eq!(crossing.user_id, "u1");
                assert_eq!(crossing.crossing_kind, CrossingKind::Exit);
            }
            other => panic!("expected geofence event, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        let payload = r#"{"id": "evt-2", "kind": "userDeleted", "userId": "u1"}"#;
        assert!(parse_event(payload).is_err());
    }
}
