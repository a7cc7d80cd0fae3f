//! Prometheus Metrics Module
//!
//! Provides relay-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Active WebSocket connections and online identities
//! - Broker publishes by topic and outcome
//! - Broker records consumed by topic and outcome
//! - Per-connection deliveries by outcome

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active WebSocket connections gauge
pub static CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("connections_active", "Number of open relay connections").namespace("chat_relay"),
    )
    .expect("Failed to create CONNECTIONS_ACTIVE metric")
});

/// Identities with at least one open connection on this node
pub static ONLINE_IDENTITIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("online_identities", "Number of online identities").namespace("chat_relay"),
    )
    .expect("Failed to create ONLINE_IDENTITIES metric")
});

/// Broker publishes by topic and outcome ("ok", "error")
pub static RECORDS_PUBLISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("records_published_total", "Records published to the broker")
            .namespace("chat_relay"),
        &["topic", "outcome"],
    )
    .expect("Failed to create RECORDS_PUBLISHED_TOTAL metric")
});

/// Broker records consumed by topic and outcome ("relayed", "malformed")
pub static RECORDS_CONSUMED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("records_consumed_total", "Records read from the broker")
            .namespace("chat_relay"),
        &["topic", "outcome"],
    )
    .expect("Failed to create RECORDS_CONSUMED_TOTAL metric")
});

/// Deliveries into connection queues by outcome ("delivered", "timeout", "closed")
pub static DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deliveries_total", "Per-connection delivery attempts").namespace("chat_relay"),
        &["outcome"],
    )
    .expect("Failed to create DELIVERIES_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(ONLINE_IDENTITIES.clone()))
        .expect("Failed to register ONLINE_IDENTITIES");
    registry
        .register(Box::new(RECORDS_PUBLISHED_TOTAL.clone()))
        .expect("Failed to register RECORDS_PUBLISHED_TOTAL");
    registry
        .register(Box::new(RECORDS_CONSUMED_TOTAL.clone()))
        .expect("Failed to register RECORDS_CONSUMED_TOTAL");
    registry
        .register(Box::new(DELIVERIES_TOTAL.clone()))
        .expect("Failed to register DELIVERIES_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to update connection gauges from the registry
pub fn set_connection_gauges(connections: usize, identities: usize) {
    CONNECTIONS_ACTIVE.set(connections as i64);
    ONLINE_IDENTITIES.set(identities as i64);
}

/// Helper to record a publish attempt
pub fn record_publish(topic: &str, ok: bool) {
    RECORDS_PUBLISHED_TOTAL
        .with_label_values(&[topic, if ok { "ok" } else { "error" }])
        .inc();
}

/// Helper to record a consumed record
pub fn record_consumed(topic: &str, outcome: &str) {
    RECORDS_CONSUMED_TOTAL
        .with_label_values(&[topic, outcome])
        .inc();
}

/// Helper to record a delivery outcome
pub fn record_delivery(outcome: &str) {
    DELIVERIES_TOTAL.with_label_values(&[outcome]).inc();
}
