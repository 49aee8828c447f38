//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    EVENTS_RECEIVED_TOTAL, FAILURES_TOTAL, HANDLE_LATENCY, OUTCOMES_TOTAL,
    REDIS_RECONNECTIONS_TOTAL, REDIS_SUBSCRIBER_CONNECTED, SKIPPED_TOTAL, STAGE_LATENCY,
    TRIGGER_MESSAGES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatcher metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    pub fn record_received(kind: &str) {
        EVENTS_RECEIVED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_sent(kind: &str) {
        OUTCOMES_TOTAL.with_label_values(&[kind, "sent"]).inc();
    }

    pub fn record_skipped(kind: &str, reason: &str) {
        OUTCOMES_TOTAL.with_label_values(&[kind, "skipped"]).inc();
        SKIPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_failed(kind: &str, code: &str) {
        OUTCOMES_TOTAL.with_label_values(&[kind, "failed"]).inc();
        FAILURES_TOTAL.with_label_values(&[code]).inc();
    }

    pub fn record_invalid(kind: &str) {
        OUTCOMES_TOTAL.with_label_values(&[kind, "invalid"]).inc();
    }

    pub fn observe_handle(elapsed: Duration) {
        HANDLE_LATENCY.observe(elapsed.as_secs_f64());
    }

    pub fn observe_stage(stage: &str, elapsed: Duration) {
        STAGE_LATENCY
            .with_label_values(&[stage])
            .observe(elapsed.as_secs_f64());
    }
}

/// Helper struct for recording event trigger metrics
pub struct TriggerMetrics;

impl TriggerMetrics {
    pub fn record_accepted(source: &str) {
        TRIGGER_MESSAGES_TOTAL
            .with_label_values(&[source, "accepted"])
            .inc();
    }

    pub fn record_rejected(source: &str) {
        TRIGGER_MESSAGES_TOTAL
            .with_label_values(&[source, "rejected"])
            .inc();
    }

    pub fn set_subscriber_connected(connected: bool) {
        REDIS_SUBSCRIBER_CONNECTED.set(if connected { 1 } else { 0 });
    }

    pub fn record_reconnection() {
        REDIS_RECONNECTIONS_TOTAL.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_recorded_metrics() {
        DispatchMetrics::record_received("incident_created");
        DispatchMetrics::record_skipped("geofence_crossed", "no-target-device");
        TriggerMetrics::record_accepted("http");

        let output = encode_metrics().unwrap();
        assert!(output.contains("harkai_events_received_total"));
        assert!(output.contains("harkai_skipped_total"));
        assert!(output.contains("harkai_trigger_messages_total"));
    }
}
