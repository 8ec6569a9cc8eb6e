//! Order identity and lifecycle status.
//!
//! Provides the de-duplication key (`OrderId`) and the open status
//! enumeration used throughout the feed.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque unique order identifier.
///
/// This is the de-duplication key of the merged feed. The backend
/// issues ids like `order_x8f2kq`; the client never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Create an id from any string. Use `validate` before trusting it as a key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that the id is usable as a de-duplication key.
    pub fn validate(&self) -> Result<()> {
        if self.0.trim().is_empty() {
            return Err(CoreError::InvalidRecord(
                "order id is empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Order lifecycle status.
///
/// Open enumeration: statuses the backend adds later are carried as
/// `Other` with their original spelling, never rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Created,
    Dispatched,
    DriverEnroute,
    DriverPickedup,
    Completed,
    Canceled,
    /// Any status the client does not know about.
    Other(String),
}

impl OrderStatus {
    /// Wire spelling of the status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Dispatched => "dispatched",
            Self::DriverEnroute => "driver_enroute",
            Self::DriverPickedup => "driver_pickedup",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Other(s) => s,
        }
    }

    /// Whether an order in this status needs the driver's attention
    /// (drives the audible alert).
    pub fn requires_attention(&self) -> bool {
        matches!(self, Self::Created | Self::Dispatched)
    }

    /// Whether the order has left the active workload.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => Self::Created,
            "dispatched" => Self::Dispatched,
            "driver_enroute" => Self::DriverEnroute,
            "driver_pickedup" => Self::DriverPickedup,
            "completed" => Self::Completed,
            "canceled" => Self::Canceled,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
