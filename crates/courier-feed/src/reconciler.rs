//! Order feed reconciliation.
//!
//! Holds one record set per poll scope plus an event-sourced set fed by
//! the socket stream, and merges them into a single `ReconciledFeed`:
//! unique ids (last write wins), newest `created_at` first, and the
//! derived alert flag.
//!
//! The reconciler does no locking. Callers serialize every mutation
//! through one owner (see `FeedSession` in courier-app).

use crate::error::{FeedError, FeedResult};
use courier_core::{OrderId, OrderRecord, OrderSummary, PollScope};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Immutable snapshot of the merged feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledFeed {
    /// Unique by id, sorted descending by `created_at`.
    pub orders: Arc<[OrderRecord]>,
    /// True iff any order is `created` or `dispatched`.
    pub alert_active: bool,
}

impl ReconciledFeed {
    pub fn empty() -> Self {
        Self {
            orders: Arc::from(Vec::new()),
            alert_active: false,
        }
    }

    fn from_orders(orders: Vec<OrderRecord>) -> Self {
        let alert_active = derive_alert(&orders);
        Self {
            orders: Arc::from(orders),
            alert_active,
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn get(&self, id: &OrderId) -> Option<&OrderRecord> {
        self.orders.iter().find(|o| &o.id == id)
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.get(id).is_some()
    }

    /// Ids in feed order.
    pub fn ids(&self) -> Vec<&str> {
        self.orders.iter().map(|o| o.id.as_str()).collect()
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary::from_orders(&self.orders)
    }
}

impl Default for ReconciledFeed {
    fn default() -> Self {
        Self::empty()
    }
}

/// Alert state as a pure function of the merged orders.
pub fn derive_alert(orders: &[OrderRecord]) -> bool {
    orders.iter().any(OrderRecord::requires_attention)
}

/// Result of feeding one stream event into the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New id; added to the event-sourced set.
    Inserted,
    /// Id already held by some scope; event ignored.
    Ignored,
}

/// Records held for one poll scope.
#[derive(Debug)]
struct ScopeEntry {
    /// Highest sequence ticket applied so far.
    applied_seq: u64,
    /// Write stamp of the replace that produced `records`.
    stamp: u64,
    records: Vec<OrderRecord>,
}

/// Single authoritative order collection for one driver session.
#[derive(Debug)]
pub struct OrderFeedReconciler {
    scopes: HashMap<PollScope, ScopeEntry>,
    /// Event-sourced records with their individual write stamps.
    stream: Vec<(u64, OrderRecord)>,
    /// Monotonic write counter; orders writes for last-write-wins.
    clock: u64,
    /// Position of each id's first appearance in the feed. Breaks
    /// `created_at` ties so re-writes never reorder the feed.
    first_seen: HashMap<OrderId, u64>,
    next_position: u64,
    feed: ReconciledFeed,
}

impl OrderFeedReconciler {
    pub fn new() -> Self {
        Self {
            scopes: HashMap::new(),
            stream: Vec::new(),
            clock: 0,
            first_seen: HashMap::new(),
            next_position: 0,
            feed: ReconciledFeed::empty(),
        }
    }

    /// Current merged feed. No side effects.
    pub fn current_feed(&self) -> ReconciledFeed {
        self.feed.clone()
    }

    /// Apply a full poll result for `scope`.
    ///
    /// The result is authoritative for its scope: orders absent from it
    /// leave the feed unless another scope still holds them. A result
    /// tagged with an older `seq` than one already applied to the same
    /// scope is discarded and the current feed is returned unchanged.
    ///
    /// # Errors
    /// `InvalidRecord` if any record lacks a usable id. Nothing is applied.
    pub fn replace(
        &mut self,
        scope: PollScope,
        seq: u64,
        orders: Vec<OrderRecord>,
    ) -> FeedResult<ReconciledFeed> {
        match self.replace_checked(scope, seq, orders) {
            Err(FeedError::StaleScopeUpdate {
                scope,
                seq,
                applied,
            }) => {
                debug!(%scope, seq, applied, "Discarding stale scope update");
                Ok(self.current_feed())
            }
            other => other,
        }
    }

    /// Like `replace`, but reports a stale result as `StaleScopeUpdate`.
    pub fn replace_checked(
        &mut self,
        scope: PollScope,
        seq: u64,
        orders: Vec<OrderRecord>,
    ) -> FeedResult<ReconciledFeed> {
        for order in &orders {
            order.validate()?;
        }

        if let Some(entry) = self.scopes.get(&scope) {
            if seq < entry.applied_seq {
                return Err(FeedError::StaleScopeUpdate {
                    scope,
                    seq,
                    applied: entry.applied_seq,
                });
            }
        }

        // Poll results take over stream-inserted copies of the same order.
        let polled: HashSet<&OrderId> = orders.iter().map(|o| &o.id).collect();
        let before = self.stream.len();
        self.stream.retain(|(_, held)| !polled.contains(&held.id));
        let promoted = before - self.stream.len();

        let stamp = self.tick();
        debug!(
            %scope,
            seq,
            count = orders.len(),
            promoted,
            "Applying scope update"
        );
        self.scopes.insert(
            scope,
            ScopeEntry {
                applied_seq: seq,
                stamp,
                records: orders,
            },
        );

        self.rebuild();
        Ok(self.current_feed())
    }

    /// Insert a single order from the event stream if its id is unknown.
    ///
    /// Known ids are ignored outright: fields are not updated and the
    /// feed order does not change.
    pub fn upsert(&mut self, order: OrderRecord) -> FeedResult<ReconciledFeed> {
        self.upsert_checked(order)?;
        Ok(self.current_feed())
    }

    /// Like `upsert`, but reports whether the order was inserted.
    pub fn upsert_checked(&mut self, order: OrderRecord) -> FeedResult<UpsertOutcome> {
        order.validate()?;

        if self.feed.contains(&order.id) {
            debug!(order_id = %order.id, "Ignoring stream event for known order");
            return Ok(UpsertOutcome::Ignored);
        }

        debug!(order_id = %order.id, status = %order.status, "Inserting stream order");
        let stamp = self.tick();
        self.stream.push((stamp, order));
        self.rebuild();
        Ok(UpsertOutcome::Inserted)
    }

    /// Drop everything; used when the driver session ends.
    pub fn reset(&mut self) {
        self.scopes.clear();
        self.stream.clear();
        self.first_seen.clear();
        self.feed = ReconciledFeed::empty();
    }

    /// Scopes that currently hold at least one record.
    pub fn populated_scopes(&self) -> Vec<&PollScope> {
        self.scopes
            .iter()
            .filter(|(_, entry)| !entry.records.is_empty())
            .map(|(scope, _)| scope)
            .collect()
    }

    /// Number of orders held only through the event stream.
    pub fn stream_len(&self) -> usize {
        self.stream.len()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Recompute the merged feed from every held record.
    fn rebuild(&mut self) {
        let mut held: Vec<(u64, &OrderRecord)> = self
            .scopes
            .values()
            .flat_map(|entry| entry.records.iter().map(move |r| (entry.stamp, r)))
            .chain(self.stream.iter().map(|(stamp, r)| (*stamp, r)))
            .collect();

        // Write order; stable so records keep their position within one write.
        held.sort_by_key(|(stamp, _)| *stamp);

        // Last write wins: walk newest-first and keep the first sighting.
        let mut seen: HashSet<&OrderId> = HashSet::with_capacity(held.len());
        let mut orders: Vec<OrderRecord> = held
            .iter()
            .rev()
            .filter(|(_, record)| seen.insert(&record.id))
            .map(|(_, record)| (*record).clone())
            .collect();
        orders.reverse();

        for order in &orders {
            if !self.first_seen.contains_key(&order.id) {
                self.first_seen.insert(order.id.clone(), self.next_position);
                self.next_position += 1;
            }
        }
        let held_ids: HashSet<&OrderId> = orders.iter().map(|o| &o.id).collect();
        self.first_seen.retain(|id, _| held_ids.contains(id));

        // Equal created_at keeps first-insertion order.
        let first_seen = &self.first_seen;
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| first_seen.get(&a.id).cmp(&first_seen.get(&b.id)))
        });

        self.feed = ReconciledFeed::from_orders(orders);
    }
}

impl Default for OrderFeedReconciler {
    fn default() -> Self {
        Self::new()
    }
}
