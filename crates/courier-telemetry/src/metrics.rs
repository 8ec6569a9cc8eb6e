//! Prometheus metrics for the courier order feed.
//!
//! Covers:
//! - Feed size and alert state
//! - Reconciler outcomes (replaces, stale tickets, upserts, rejected records)
//! - Poll latency and failures
//! - Socket connection state
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a startup bug. These panics only occur
//! during static initialization, never at runtime.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, register_int_counter,
    register_int_gauge, CounterVec, Encoder, Gauge, HistogramVec, IntCounter, IntGauge,
    TextEncoder,
};

/// Orders currently in the reconciled feed.
pub static FEED_ORDERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("courier_feed_orders", "Orders in the reconciled feed").unwrap()
});

/// Alert state (1 = an order needs the driver's attention).
pub static ALERT_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("courier_alert_active", "Audible alert state (1=active)").unwrap()
});

/// Applied scope replacements.
/// Labels: scope (date/nearby/<name>)
pub static REPLACE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "courier_replace_total",
        "Applied poll scope replacements",
        &["scope"]
    )
    .unwrap()
});

/// Poll results discarded for carrying an older ticket.
pub static STALE_UPDATE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "courier_stale_update_total",
        "Poll results discarded as stale",
        &["scope"]
    )
    .unwrap()
});

/// Stream upserts.
/// Labels: outcome (inserted/ignored)
pub static UPSERT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("courier_upsert_total", "Stream upserts", &["outcome"]).unwrap()
});

/// Records rejected by validation.
/// Labels: source (poll/stream)
pub static INVALID_RECORD_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "courier_invalid_record_total",
        "Order records rejected by validation",
        &["source"]
    )
    .unwrap()
});

/// Poll request latency in milliseconds.
pub static POLL_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "courier_poll_latency_ms",
        "Order query latency in milliseconds",
        &["scope"],
        vec![10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Failed poll requests.
pub static POLL_FAILURE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "courier_poll_failure_total",
        "Failed order queries",
        &["scope"]
    )
    .unwrap()
});

/// Socket connection state (1 = subscribed, 0 = not).
pub static SOCKET_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "courier_socket_connected",
        "Socket channel subscription state (1=subscribed)"
    )
    .unwrap()
});

/// Socket disconnects followed by a reconnect attempt.
pub static SOCKET_RECONNECT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("courier_socket_reconnect_total", "Socket reconnections").unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Publish feed size and alert state.
    pub fn feed_updated(orders: usize, alert_active: bool) {
        FEED_ORDERS.set(orders as i64);
        ALERT_ACTIVE.set(i64::from(alert_active));
    }

    /// Record an applied scope replacement.
    pub fn replace_applied(scope: &str) {
        REPLACE_TOTAL.with_label_values(&[scope]).inc();
    }

    /// Record a discarded stale poll result.
    pub fn stale_update(scope: &str) {
        STALE_UPDATE_TOTAL.with_label_values(&[scope]).inc();
    }

    /// Record a stream upsert outcome.
    pub fn upsert(outcome: &str) {
        UPSERT_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record rejected records.
    pub fn invalid_records(source: &str, count: usize) {
        INVALID_RECORD_TOTAL
            .with_label_values(&[source])
            .inc_by(count as f64);
    }

    /// Record poll latency.
    pub fn poll_latency(scope: &str, latency_ms: f64) {
        POLL_LATENCY_MS
            .with_label_values(&[scope])
            .observe(latency_ms);
    }

    /// Record a failed poll.
    pub fn poll_failed(scope: &str) {
        POLL_FAILURE_TOTAL.with_label_values(&[scope]).inc();
    }

    /// Record socket subscribed.
    pub fn socket_connected() {
        SOCKET_CONNECTED.set(1.0);
    }

    /// Record socket disconnected.
    pub fn socket_disconnected() {
        SOCKET_CONNECTED.set(0.0);
        SOCKET_RECONNECT_TOTAL.inc();
    }

    /// Render all registered metrics in the text exposition format.
    pub fn encode() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
