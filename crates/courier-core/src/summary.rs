//! Aggregate metrics over a set of orders.
//!
//! "Active" orders are those still on the driver's plate: not completed,
//! not canceled, and with a filled payload.

use crate::record::OrderRecord;
use crate::order::OrderStatus;
use rust_decimal::Decimal;
use serde::Serialize;

/// Workload summary shown above the order list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub active_orders: usize,
    pub active_with_completed: usize,
    pub total_stops: usize,
    /// Seconds.
    pub total_duration: f64,
    /// Meters.
    pub total_distance: f64,
    pub total_cash: Decimal,
}

impl OrderSummary {
    pub fn from_orders(orders: &[OrderRecord]) -> Self {
        Self {
            active_orders: active_count(orders),
            active_with_completed: active_count_with_completed(orders),
            total_stops: total_stops(orders),
            total_duration: total_duration(orders),
            total_distance: total_distance(orders),
            total_cash: total_cash(orders),
        }
    }
}

fn is_active(order: &OrderRecord) -> bool {
    !order.status.is_closed() && order.has_payload()
}

/// Orders still to be worked.
pub fn active_count(orders: &[OrderRecord]) -> usize {
    orders.iter().filter(|o| is_active(o)).count()
}

/// Like `active_count`, but completed orders count too.
pub fn active_count_with_completed(orders: &[OrderRecord]) -> usize {
    orders
        .iter()
        .filter(|o| o.status != OrderStatus::Canceled && o.has_payload())
        .count()
}

/// Pickup + dropoff + intermediate waypoints, per active order.
pub fn total_stops(orders: &[OrderRecord]) -> usize {
    orders
        .iter()
        .filter(|o| is_active(o))
        .map(|o| o.waypoint_count() + 2)
        .sum()
}

pub fn total_duration(orders: &[OrderRecord]) -> f64 {
    orders.iter().filter(|o| is_active(o)).map(|o| o.time).sum()
}

pub fn total_distance(orders: &[OrderRecord]) -> f64 {
    orders
        .iter()
        .filter(|o| is_active(o))
        .map(|o| o.distance)
        .sum()
}

/// Cash to collect across all non-canceled orders. Unparseable amounts count as zero.
pub fn total_cash(orders: &[OrderRecord]) -> Decimal {
    orders
        .iter()
        .filter(|o| o.status != OrderStatus::Canceled)
        .filter_map(OrderRecord::cash_on_delivery)
        .sum()
}
