//! Order feed reconciliation for the courier driver client.
//!
//! Merges order data from date-scoped polls, nearby polls and the
//! socket/push event stream into one de-duplicated, newest-first
//! feed, and derives whether the audible alert should be active.

pub mod error;
pub mod event;
pub mod reconciler;
pub mod sequencer;
pub mod wire;

pub use error::{FeedError, FeedResult};
pub use event::StreamEvent;
pub use reconciler::{derive_alert, OrderFeedReconciler, ReconciledFeed, UpsertOutcome};
pub use sequencer::ScopeSequencer;
pub use wire::{parse_orders, ParsedOrders, RawOrder};
