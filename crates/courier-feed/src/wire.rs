//! Order JSON parsing.
//!
//! Converts the backend's order JSON (REST query results and socket
//! event payloads) into validated `OrderRecord`s.
//!
//! Supports two result envelopes:
//! 1. Bare array: `[{...}, {...}]`
//! 2. Wrapped: `{"data": [{...}, {...}]}`

use crate::error::{FeedError, FeedResult};
use chrono::{DateTime, Utc};
use courier_core::{OrderId, OrderRecord, OrderStatus};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Raw order as sent by the backend.
///
/// Everything is optional here so that a malformed record produces a
/// precise `InvalidRecord` instead of a generic JSON error.
#[derive(Debug, Deserialize)]
pub struct RawOrder {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "scheduledAt")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Meters. The backend sometimes sends numbers as strings.
    #[serde(default)]
    pub distance: Option<Value>,
    /// Seconds.
    #[serde(default)]
    pub time: Option<Value>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub meta: Value,
}

impl TryFrom<RawOrder> for OrderRecord {
    type Error = FeedError;

    fn try_from(raw: RawOrder) -> FeedResult<Self> {
        let id = match raw.id {
            Some(Value::String(id)) => OrderId::new(id),
            Some(other) => {
                return Err(FeedError::InvalidRecord(format!(
                    "order id is not a string: {other}"
                )))
            }
            None => return Err(FeedError::InvalidRecord("order id missing".to_string())),
        };
        id.validate()?;

        let status = raw.status.ok_or_else(|| {
            FeedError::InvalidRecord(format!("order {id} has no status"))
        })?;
        let created_at = raw.created_at.ok_or_else(|| {
            FeedError::InvalidRecord(format!("order {id} has no created_at"))
        })?;

        Ok(OrderRecord {
            id,
            status: OrderStatus::from(status),
            created_at,
            scheduled_at: raw.scheduled_at,
            distance: number(raw.distance.as_ref()),
            time: number(raw.time.as_ref()),
            payload: raw.payload,
            meta: raw.meta,
        })
    }
}

/// Numeric field that may arrive as a number, a numeric string, or not at all.
fn number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// Parse a single order object.
pub fn parse_order(value: Value) -> FeedResult<OrderRecord> {
    let raw: RawOrder = serde_json::from_value(value)?;
    OrderRecord::try_from(raw)
}

/// Outcome of parsing a poll result.
#[derive(Debug, Default)]
pub struct ParsedOrders {
    /// Records that passed validation, in response order.
    pub orders: Vec<OrderRecord>,
    /// Per-record rejections.
    pub rejected: Vec<FeedError>,
}

/// Parse a full query result.
///
/// Invalid records are collected in `rejected` rather than failing the
/// whole batch; a structurally wrong body (not an array or `data` array)
/// is an error.
pub fn parse_orders(body: &str) -> FeedResult<ParsedOrders> {
    let value: Value = serde_json::from_str(body)?;
    parse_orders_value(value)
}

/// Same as `parse_orders`, for an already-decoded body.
pub fn parse_orders_value(value: Value) -> FeedResult<ParsedOrders> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(FeedError::ParseError(
                    "expected an array or an object with a data array".to_string(),
                ))
            }
        },
        other => {
            return Err(FeedError::ParseError(format!(
                "unexpected order list body: {other}"
            )))
        }
    };

    let mut parsed = ParsedOrders::default();
    for item in items {
        match parse_order(item) {
            Ok(order) => parsed.orders.push(order),
            Err(e) => {
                warn!(error = %e, "Skipping invalid order record");
                parsed.rejected.push(e);
            }
        }
    }
    Ok(parsed)
}
