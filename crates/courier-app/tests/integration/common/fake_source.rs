//! In-memory order source.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use courier_api::{ApiResult, OrderSource};
use courier_core::{OrderRecord, OrderStatus, PollScope};
use courier_feed::ParsedOrders;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Serves whatever orders were last set for a scope kind.
#[derive(Default)]
pub struct FakeSource {
    by_label: Mutex<HashMap<String, Vec<OrderRecord>>>,
    fetches: AtomicU32,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer future fetches for scopes labelled `label` ("date", "nearby").
    pub fn set(&self, label: &str, orders: Vec<OrderRecord>) {
        self.by_label.lock().insert(label.to_string(), orders);
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderSource for FakeSource {
    async fn fetch(&self, scope: &PollScope) -> ApiResult<ParsedOrders> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let orders = self
            .by_label
            .lock()
            .get(scope.label())
            .cloned()
            .unwrap_or_default();
        Ok(ParsedOrders {
            orders,
            rejected: Vec::new(),
        })
    }
}

/// Order created at 08:`minute` UTC on 2024-05-01.
pub fn order(id: &str, status: OrderStatus, minute: u32) -> OrderRecord {
    OrderRecord::new(
        id,
        status,
        Utc.with_ymd_and_hms(2024, 5, 1, 8, minute, 0).unwrap(),
    )
}
