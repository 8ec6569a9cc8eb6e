//! Stream event classification.
//!
//! The socket channel publishes `{"event": "...", "data": {...}}`
//! envelopes on `driver.<id>`. Push notifications carry no order data
//! of their own; they only tell the client that its order list changed.

use crate::error::{FeedError, FeedResult};
use crate::wire::parse_order;
use courier_core::OrderRecord;
use serde_json::Value;
use tracing::debug;

/// Event name for a newly ready order.
pub const ORDER_READY: &str = "order.ready";

/// Parsed stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A new order is ready for the driver; upsert it.
    OrderReady(OrderRecord),
    /// Something about the driver's orders changed; re-poll the date scope.
    RefreshRequested { reason: String },
    /// Not an order event.
    Other { event: String },
}

impl StreamEvent {
    /// Classify a channel publication envelope.
    ///
    /// # Errors
    /// `InvalidRecord` when an `order.ready` payload has no usable id,
    /// `ParseError` when the envelope has no `event` name.
    pub fn from_channel_data(data: &Value) -> FeedResult<Self> {
        let event = data
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| FeedError::ParseError("channel data without event name".to_string()))?;

        if event == ORDER_READY {
            let payload = data.get("data").cloned().unwrap_or(Value::Null);
            return Ok(Self::OrderReady(parse_order(payload)?));
        }

        // Other order lifecycle events change records we already hold;
        // upsert would ignore them, so let the date poll pick them up.
        if event.starts_with("order.") {
            debug!(event, "Order lifecycle event, requesting refresh");
            return Ok(Self::RefreshRequested {
                reason: event.to_string(),
            });
        }

        Ok(Self::Other {
            event: event.to_string(),
        })
    }

    /// A push notification was received.
    pub fn from_notification(notification: &Value) -> Self {
        let reason = notification
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("notification")
            .to_string();
        Self::RefreshRequested { reason }
    }

    /// Short name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderReady(_) => "order_ready",
            Self::RefreshRequested { .. } => "refresh",
            Self::Other { .. } => "other",
        }
    }
}
