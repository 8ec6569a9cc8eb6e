//! Heartbeat management for the socket connection.
//!
//! The server pings every few seconds; the client only answers. A
//! connection that has been silent for longer than the timeout is
//! considered dead and is torn down for reconnection.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tracks connection liveness from inbound traffic.
pub struct HeartbeatManager {
    /// How long the connection may stay silent.
    timeout_ms: u64,
    /// Last message received time (any message).
    last_message: Arc<RwLock<DateTime<Utc>>>,
    /// Last server ping received.
    last_ping: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl HeartbeatManager {
    /// Create a new heartbeat manager.
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            last_message: Arc::new(RwLock::new(Utc::now())),
            last_ping: Arc::new(RwLock::new(None)),
        }
    }

    /// Reset heartbeat state (called on connection).
    pub fn reset(&self) {
        *self.last_message.write() = Utc::now();
        *self.last_ping.write() = None;
    }

    /// Record that any message was received.
    pub fn record_message(&self) {
        *self.last_message.write() = Utc::now();
    }

    /// Record a server ping.
    pub fn record_ping(&self) {
        let now = Utc::now();
        if let Some(prev) = *self.last_ping.read() {
            debug!(interval_ms = (now - prev).num_milliseconds(), "Server ping");
        }
        *self.last_ping.write() = Some(now);
        self.record_message();
    }

    /// Get time since last message.
    pub fn time_since_last_message_ms(&self) -> i64 {
        (Utc::now() - *self.last_message.read()).num_milliseconds()
    }

    /// Check if the connection has been silent for too long.
    pub fn is_timed_out(&self) -> bool {
        self.time_since_last_message_ms() > self.timeout_ms as i64
    }

    /// Wait for the next liveness check.
    pub async fn wait_for_check(&self) {
        tokio::time::sleep(Duration::from_millis((self.timeout_ms / 4).max(1))).await;
    }

    /// Last server ping, if any.
    pub fn last_ping(&self) -> Option<DateTime<Utc>> {
        *self.last_ping.read()
    }
}
