//! Alert transitions.
//!
//! The feed only carries a boolean. Whoever plays the sound needs to know
//! when it flips, so the monitor turns snapshots into start/stop edges.

use crate::session::FeedSnapshot;
use courier_feed::ReconciledFeed;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Edge in the alert state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    /// An order started needing attention; begin the alert.
    Start,
    /// No order needs attention any more; stop the alert.
    Stop,
}

/// Edge detector over alert state.
#[derive(Debug, Default)]
pub struct AlertMonitor {
    active: bool,
}

impl AlertMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed one snapshot; returns the transition it causes, if any.
    pub fn observe(&mut self, feed: &ReconciledFeed) -> Option<AlertTransition> {
        match (self.active, feed.alert_active) {
            (false, true) => {
                self.active = true;
                Some(AlertTransition::Start)
            }
            (true, false) => {
                self.active = false;
                Some(AlertTransition::Stop)
            }
            _ => None,
        }
    }

    /// Forward transitions for every published snapshot until shutdown.
    pub async fn run(
        mut self,
        mut snapshots: watch::Receiver<FeedSnapshot>,
        transitions: mpsc::Sender<AlertTransition>,
        shutdown: CancellationToken,
    ) {
        loop {
            let transition = {
                let snapshot = snapshots.borrow_and_update();
                self.observe(&snapshot.feed)
            };

            if let Some(transition) = transition {
                info!(?transition, "Alert transition");
                if transitions.send(transition).await.is_err() {
                    debug!("Alert receiver dropped, stopping monitor");
                    break;
                }
            }

            tokio::select! {
                () = shutdown.cancelled() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        debug!("Feed session gone, stopping alert monitor");
                        break;
                    }
                }
            }
        }

        if self.active {
            // Never leave the sound running after the session ends.
            let _ = transitions.send(AlertTransition::Stop).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_core::{OrderRecord, OrderStatus, PollScope};
    use courier_feed::OrderFeedReconciler;
    use std::time::Duration;

    fn feed_with(statuses: &[OrderStatus]) -> ReconciledFeed {
        let orders = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| OrderRecord::new(format!("o{i}"), status.clone(), Utc::now()))
            .collect();
        OrderFeedReconciler::new()
            .replace(PollScope::Nearby, 1, orders)
            .unwrap()
    }

    #[test]
    fn test_edges_only() {
        let mut monitor = AlertMonitor::new();

        assert_eq!(monitor.observe(&feed_with(&[OrderStatus::Completed])), None);
        assert_eq!(
            monitor.observe(&feed_with(&[OrderStatus::Created])),
            Some(AlertTransition::Start)
        );
        assert_eq!(
            monitor.observe(&feed_with(&[OrderStatus::Dispatched])),
            None
        );
        assert!(monitor.is_active());
        assert_eq!(
            monitor.observe(&feed_with(&[OrderStatus::DriverEnroute])),
            Some(AlertTransition::Stop)
        );
        assert_eq!(monitor.observe(&ReconciledFeed::empty()), None);
    }

    #[tokio::test]
    async fn test_run_emits_transitions_and_stops_on_shutdown() {
        let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::default());
        let (transition_tx, mut transition_rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(AlertMonitor::new().run(
            snapshot_rx,
            transition_tx,
            shutdown.clone(),
        ));

        snapshot_tx.send_replace(FeedSnapshot {
            revision: 1,
            feed: feed_with(&[OrderStatus::Created]),
        });

        let first = tokio::time::timeout(Duration::from_secs(1), transition_rx.recv())
            .await
            .unwrap();
        assert_eq!(first, Some(AlertTransition::Start));

        shutdown.cancel();
        task.await.unwrap();

        // Active alert is stopped on the way out.
        assert_eq!(transition_rx.recv().await, Some(AlertTransition::Stop));
    }
}
