//! REST client for courier order queries.
//!
//! Fetches a driver's orders for a poll scope (a calendar date or the
//! nearby ad-hoc pool) and hands back parsed records. The `OrderSource`
//! trait is the seam pollers are written against.

pub mod client;
pub mod error;

pub use client::{query_params, OrderSource, OrdersClient};
pub use error::{ApiError, ApiResult};
