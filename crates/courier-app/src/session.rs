//! Feed session actor.
//!
//! One task owns the reconciler and drains a command queue, so poll
//! results and stream events are applied strictly one at a time. Readers
//! never touch the reconciler; they get immutable snapshots from a watch
//! channel.

use crate::error::{AppError, AppResult};
use courier_core::{OrderRecord, PollScope};
use courier_feed::{OrderFeedReconciler, ReconciledFeed, StreamEvent, UpsertOutcome};
use courier_telemetry::Metrics;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default command queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Mutation requests for the session.
#[derive(Debug, Clone)]
pub enum FeedCommand {
    /// Full poll result for a scope, tagged with its ticket.
    Replace {
        scope: PollScope,
        seq: u64,
        orders: Vec<OrderRecord>,
    },
    /// Single order from the event stream.
    Upsert(OrderRecord),
    /// Classified socket publication.
    Stream(StreamEvent),
    /// Drop all state (driver signed out).
    Reset,
}

/// Published feed state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    /// Increments whenever the feed changes.
    pub revision: u64,
    pub feed: ReconciledFeed,
}

/// Cloneable handle into a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<FeedCommand>,
    snapshots: watch::Receiver<FeedSnapshot>,
}

impl SessionHandle {
    pub async fn send(&self, command: FeedCommand) -> AppResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AppError::SessionClosed)
    }

    pub async fn replace(
        &self,
        scope: PollScope,
        seq: u64,
        orders: Vec<OrderRecord>,
    ) -> AppResult<()> {
        self.send(FeedCommand::Replace { scope, seq, orders }).await
    }

    pub async fn upsert(&self, order: OrderRecord) -> AppResult<()> {
        self.send(FeedCommand::Upsert(order)).await
    }

    pub async fn stream(&self, event: StreamEvent) -> AppResult<()> {
        self.send(FeedCommand::Stream(event)).await
    }

    /// Latest published snapshot.
    pub fn current(&self) -> FeedSnapshot {
        self.snapshots.borrow().clone()
    }

    /// New receiver for snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshots.clone()
    }
}

/// Single-writer owner of the reconciler.
pub struct FeedSession {
    reconciler: OrderFeedReconciler,
    commands: mpsc::Receiver<FeedCommand>,
    snapshots: watch::Sender<FeedSnapshot>,
    /// Woken when the stream asks for the date scope to be re-polled.
    refresh: Arc<Notify>,
    revision: u64,
}

impl FeedSession {
    /// Create a session and the handle used to reach it.
    pub fn new(capacity: usize, refresh: Arc<Notify>) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::default());

        let session = Self {
            reconciler: OrderFeedReconciler::new(),
            commands: command_rx,
            snapshots: snapshot_tx,
            refresh,
            revision: 0,
        };
        let handle = SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (session, handle)
    }

    /// Drain commands until shutdown or until every handle is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Feed session started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping feed session");
                    break;
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.apply(command),
                        None => {
                            info!("All session handles dropped, stopping feed session");
                            break;
                        }
                    }
                }
            }
        }

        self.reconciler.reset();
        info!(revision = self.revision, "Feed session stopped");
    }

    fn apply(&mut self, command: FeedCommand) {
        match command {
            FeedCommand::Replace { scope, seq, orders } => self.apply_replace(scope, seq, orders),
            FeedCommand::Upsert(order) => self.apply_upsert(order),
            FeedCommand::Stream(event) => self.apply_stream(event),
            FeedCommand::Reset => {
                info!("Resetting feed");
                self.reconciler.reset();
                self.publish(self.reconciler.current_feed());
            }
        }
    }

    fn apply_replace(&mut self, scope: PollScope, seq: u64, orders: Vec<OrderRecord>) {
        let label = scope.label().to_string();
        match self.reconciler.replace_checked(scope, seq, orders) {
            Ok(feed) => {
                Metrics::replace_applied(&label);
                self.publish(feed);
            }
            Err(e) if e.is_stale() => {
                Metrics::stale_update(&label);
                debug!(error = %e, "Discarded stale poll result");
            }
            Err(e) => {
                Metrics::invalid_records("poll", 1);
                warn!(scope = %label, seq, error = %e, "Rejected poll result");
            }
        }
    }

    fn apply_upsert(&mut self, order: OrderRecord) {
        let order_id = order.id.clone();
        match self.reconciler.upsert_checked(order) {
            Ok(UpsertOutcome::Inserted) => {
                Metrics::upsert("inserted");
                info!(%order_id, "New order from stream");
                self.publish(self.reconciler.current_feed());
            }
            Ok(UpsertOutcome::Ignored) => {
                Metrics::upsert("ignored");
            }
            Err(e) => {
                Metrics::invalid_records("stream", 1);
                warn!(error = %e, "Rejected stream order");
            }
        }
    }

    fn apply_stream(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::OrderReady(order) => self.apply_upsert(order),
            StreamEvent::RefreshRequested { reason } => {
                debug!(%reason, "Refresh requested");
                self.refresh.notify_one();
            }
            StreamEvent::Other { event } => {
                debug!(%event, "Ignoring stream event");
            }
        }
    }

    fn publish(&mut self, feed: ReconciledFeed) {
        if self.snapshots.borrow().feed == feed {
            return;
        }
        self.revision += 1;
        Metrics::feed_updated(feed.len(), feed.alert_active);
        debug!(
            revision = self.revision,
            orders = feed.len(),
            alert_active = feed.alert_active,
            "Publishing feed snapshot"
        );
        self.snapshots.send_replace(FeedSnapshot {
            revision: self.revision,
            feed,
        });
    }
}
