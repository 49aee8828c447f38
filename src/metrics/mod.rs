//! Prometheus metrics for the notification dispatcher.
//!
//! - Event metrics (received events, terminal outcomes, skip reasons, failure codes)
//! - Latency metrics (whole handle call, per collaborator stage)
//! - Trigger metrics (HTTP and Redis event sources)

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, TriggerMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "harkai";

lazy_static! {
    // ============================================================================
    // Event Metrics
    // ============================================================================

    /// Domain events handed to the dispatcher, by event kind
    pub static ref EVENTS_RECEIVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_events_received_total", METRIC_PREFIX),
        "Total domain events received by the dispatcher",
        &["kind"]
    ).unwrap();

    /// Terminal outcomes by event kind and outcome (sent, skipped, failed, invalid)
    pub static ref OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_outcomes_total", METRIC_PREFIX),
        "Total terminal dispatch outcomes",
        &["kind", "outcome"]
    ).unwrap();

    pub static ref SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_skipped_total", METRIC_PREFIX),
        "Total skipped deliveries by reason",
        &["reason"]
    ).unwrap();

    pub static ref FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_failures_total", METRIC_PREFIX),
        "Total failed deliveries by failure code",
        &["code"]
    ).unwrap();

    // ============================================================================
    // Latency Metrics
    // ============================================================================

    /// Time spent in one handle call, validation to terminal outcome
    pub static ref HANDLE_LATENCY: Histogram = register_histogram!(
        format!("{}_handle_latency_seconds", METRIC_PREFIX),
        "Dispatcher handle latency in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Time spent in each collaborator call
    pub static ref STAGE_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_stage_latency_seconds", METRIC_PREFIX),
        "Collaborator call latency in seconds",
        &["stage"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).unwrap();

    // ============================================================================
    // Trigger Metrics
    // ============================================================================

    /// Messages received by event sources, by source and parse result
    pub static ref TRIGGER_MESSAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_trigger_messages_total", METRIC_PREFIX),
        "Total messages received by event triggers",
        &["source", "result"]
    ).unwrap();

    /// Redis subscriber connection status (1 = subscribed, 0 = not subscribed)
    pub static ref REDIS_SUBSCRIBER_CONNECTED: IntGauge = register_int_gauge!(
        format!("{}_redis_subscriber_connected", METRIC_PREFIX),
        "Redis event subscriber status (1=subscribed, 0=disconnected)"
    ).unwrap();

    pub static ref REDIS_RECONNECTIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_redis_reconnections_total", METRIC_PREFIX),
        "Total Redis subscriber reconnection attempts"
    ).unwrap();
}
