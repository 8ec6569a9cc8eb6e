//! Delivery order record.
//!
//! `OrderRecord` is the unit the feed merges. Only `id`, `status` and
//! `created_at` take part in reconciliation; everything else is payload
//! carried for the presentation layer and the summary helpers.

use crate::error::Result;
use crate::order::{OrderId, OrderStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One delivery order as known to the driver client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// De-duplication key.
    pub id: OrderId,
    /// Lifecycle status (open enumeration).
    pub status: OrderStatus,
    /// Creation time; the feed sorts newest first on this.
    pub created_at: DateTime<Utc>,
    /// Scheduled time, preferred over `created_at` for display only.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Route distance in meters.
    #[serde(default)]
    pub distance: f64,
    /// Route duration in seconds.
    #[serde(default)]
    pub time: f64,
    /// Waypoints, pickup and dropoff. Not interpreted by the feed.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Store name, order number, cash on delivery, etc.
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl OrderRecord {
    /// Create a record with empty payload and metadata.
    pub fn new(
        id: impl Into<OrderId>,
        status: impl Into<OrderStatus>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            created_at,
            scheduled_at: None,
            distance: 0.0,
            time: 0.0,
            payload: serde_json::Value::Null,
            meta: serde_json::Value::Null,
        }
    }

    pub fn with_scheduled_at(mut self, scheduled_at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(scheduled_at);
        self
    }

    pub fn with_route(mut self, distance_m: f64, time_secs: f64) -> Self {
        self.distance = distance_m;
        self.time = time_secs;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }

    /// Reject records that would corrupt the de-duplication invariant.
    pub fn validate(&self) -> Result<()> {
        self.id.validate()
    }

    /// Time shown to the driver: scheduled time if any, else creation time.
    pub fn display_at(&self) -> DateTime<Utc> {
        self.scheduled_at.unwrap_or(self.created_at)
    }

    /// Whether this order should keep the audible alert running.
    pub fn requires_attention(&self) -> bool {
        self.status.requires_attention()
    }

    /// Whether the payload has been filled in by the backend.
    pub fn has_payload(&self) -> bool {
        match &self.payload {
            serde_json::Value::Null => false,
            serde_json::Value::Object(map) => !map.is_empty(),
            _ => true,
        }
    }

    /// Number of intermediate waypoints in the payload.
    pub fn waypoint_count(&self) -> usize {
        self.payload
            .get("waypoints")
            .and_then(|w| w.as_array())
            .map_or(0, Vec::len)
    }

    /// Cash to collect on delivery, parsed from `meta.cash`.
    ///
    /// The backend sends display strings like `"KWD 12.500"`; everything
    /// except digits and `.` is stripped before parsing.
    pub fn cash_on_delivery(&self) -> Option<Decimal> {
        let raw = self.meta.get("cash")?.as_str()?;
        let digits: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        Decimal::from_str(&digits).ok()
    }
}
