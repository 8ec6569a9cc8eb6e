//! Application orchestration.
//!
//! Wires the feed session, the scope pollers, the socket subscriber and
//! the alert monitor together, and tears them down on ctrl-c.

use crate::alert::{AlertMonitor, AlertTransition};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::poller::ScopePoller;
use crate::session::{FeedSession, FeedSnapshot, SessionHandle, DEFAULT_QUEUE_CAPACITY};
use courier_api::{OrderSource, OrdersClient};
use courier_core::PollScope;
use courier_feed::{ScopeSequencer, StreamEvent};
use courier_telemetry::Metrics;
use courier_ws::{SocketEvent, SocketSubscriber};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// How long shutdown waits for tasks to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Queue depth for push notifications.
const NOTIFICATION_CAPACITY: usize = 32;

/// Delivers device push notifications into a running application.
///
/// Every notification triggers a full re-poll of the date scope.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Value>,
}

impl Notifier {
    pub async fn notify(&self, notification: Value) -> AppResult<()> {
        self.tx
            .send(notification)
            .await
            .map_err(|_| AppError::SessionClosed)
    }
}

/// Main application.
pub struct Application {
    config: AppConfig,
    session_id: Uuid,
    shutdown: CancellationToken,
    notifier: Notifier,
    notifications: Option<mpsc::Receiver<Value>>,
}

impl Application {
    /// Create a new application instance.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let (tx, rx) = mpsc::channel(NOTIFICATION_CAPACITY);
        Ok(Self {
            config,
            session_id: Uuid::new_v4(),
            shutdown: CancellationToken::new(),
            notifier: Notifier { tx },
            notifications: Some(rx),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Entry point for push notifications.
    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    /// Token that stops every task when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until ctrl-c.
    pub async fn run(self) -> AppResult<()> {
        let client = OrdersClient::new(
            &self.config.api.host,
            self.config.api.resolved_key(),
            &self.config.driver_id,
            self.config.api.timeout(),
        )?;
        let span = tracing::info_span!(
            "session",
            id = %self.session_id,
            driver = %self.config.driver_id
        );
        self.run_with_source(Arc::new(client)).instrument(span).await
    }

    /// Run against any order source until ctrl-c or cancellation.
    pub async fn run_with_source<S>(mut self, source: Arc<S>) -> AppResult<()>
    where
        S: OrderSource + 'static,
    {
        info!(
            api_host = %self.config.api.host,
            socket_enabled = self.config.socket.enabled,
            nearby_enabled = self.config.poll.nearby_enabled,
            "Starting order feed session"
        );

        let refresh = Arc::new(Notify::new());
        let (session, handle) = FeedSession::new(DEFAULT_QUEUE_CAPACITY, refresh.clone());
        let sequencer = Arc::new(ScopeSequencer::new());
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        tasks.push(tokio::spawn(session.run(self.shutdown.clone())));

        let date_poller = match self.config.poll.date {
            Some(date) => ScopePoller::new(
                source.clone(),
                PollScope::Date(date),
                self.config.poll.date_interval(),
                sequencer.clone(),
                handle.clone(),
            ),
            None => ScopePoller::for_today(
                source.clone(),
                self.config.poll.date_interval(),
                sequencer.clone(),
                handle.clone(),
            ),
        }
        .with_refresh(refresh.clone());
        tasks.push(tokio::spawn(date_poller.run(self.shutdown.clone())));

        if self.config.poll.nearby_enabled {
            let nearby_poller = ScopePoller::new(
                source.clone(),
                PollScope::Nearby,
                self.config.poll.nearby_interval(),
                sequencer.clone(),
                handle.clone(),
            );
            tasks.push(tokio::spawn(nearby_poller.run(self.shutdown.clone())));
        }

        if self.config.socket.enabled {
            tasks.extend(self.spawn_socket(handle.clone(), refresh.clone()));
        }

        if let Some(notifications) = self.notifications.take() {
            tasks.push(tokio::spawn(forward_notifications(
                notifications,
                handle.clone(),
                self.shutdown.clone(),
            )));
        }

        let (alert_tx, mut alert_rx) = mpsc::channel(16);
        tasks.push(tokio::spawn(AlertMonitor::new().run(
            handle.subscribe(),
            alert_tx,
            self.shutdown.clone(),
        )));

        let mut snapshots = handle.subscribe();
        drop(handle);

        info!("Entering main event loop");
        loop {
            tokio::select! {
                Some(transition) = alert_rx.recv() => {
                    match transition {
                        AlertTransition::Start => info!("Alert on: order awaiting driver"),
                        AlertTransition::Stop => info!("Alert off"),
                    }
                }

                changed = snapshots.changed() => {
                    if changed.is_err() {
                        warn!("Feed session ended");
                        break;
                    }
                    log_snapshot(&snapshots);
                }

                () = self.shutdown.cancelled() => {
                    info!("Shutdown token cancelled");
                    break;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown.cancel();
        for task in tasks {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("Task did not stop within grace period");
            }
        }

        info!("Shutdown complete");
        Ok(())
    }

    fn spawn_socket(&self, session: SessionHandle, refresh: Arc<Notify>) -> Vec<JoinHandle<()>> {
        let (event_tx, mut event_rx) = mpsc::channel::<SocketEvent>(256);
        let subscriber = SocketSubscriber::new(
            self.config.socket.to_socket_config(&self.config.driver_id),
            event_tx,
        )
        .with_shutdown_token(self.shutdown.clone());

        let socket_task = tokio::spawn(async move {
            if let Err(e) = subscriber.run().await {
                error!(?e, "Socket subscriber stopped");
            }
        });

        let forward_task = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    SocketEvent::Subscribed => {
                        Metrics::socket_connected();
                        // Events published while we were away are gone.
                        refresh.notify_one();
                    }
                    SocketEvent::Disconnected { reason } => {
                        Metrics::socket_disconnected();
                        debug!(%reason, "Socket disconnected");
                    }
                    SocketEvent::Stream(event) => {
                        debug!(kind = event.kind(), "Stream event");
                        if session.stream(event).await.is_err() {
                            break;
                        }
                    }
                    SocketEvent::Rejected { reason } => {
                        Metrics::invalid_records("stream", 1);
                        debug!(%reason, "Rejected stream event");
                    }
                }
            }
        });

        vec![socket_task, forward_task]
    }
}

async fn forward_notifications(
    mut notifications: mpsc::Receiver<Value>,
    session: SessionHandle,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            received = notifications.recv() => {
                let Some(notification) = received else { break };
                let event = StreamEvent::from_notification(&notification);
                debug!(kind = event.kind(), "Push notification");
                if session.stream(event).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn log_snapshot(snapshots: &watch::Receiver<FeedSnapshot>) {
    let snapshot = snapshots.borrow();
    let summary = snapshot.feed.summary();
    info!(
        revision = snapshot.revision,
        orders = snapshot.feed.len(),
        active = summary.active_orders,
        stops = summary.total_stops,
        distance_m = summary.total_distance,
        cash = %summary.total_cash,
        alert_active = snapshot.feed.alert_active,
        "Feed updated"
    );
}
