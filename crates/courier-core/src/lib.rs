//! Core domain types for the courier driver order feed.
//!
//! This crate provides the types shared by every other courier crate:
//! - `OrderId`, `OrderStatus`: identity and lifecycle of a delivery order
//! - `OrderRecord`: one order as known to the driver client
//! - `PollScope`: the query scope a poll result is authoritative for
//! - `OrderSummary`: aggregate metrics over a set of orders

pub mod error;
pub mod order;
pub mod record;
pub mod scope;
pub mod summary;

pub use error::{CoreError, Result};
pub use order::{OrderId, OrderStatus};
pub use record::OrderRecord;
pub use scope::PollScope;
pub use summary::OrderSummary;
