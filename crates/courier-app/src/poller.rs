//! Periodic scope polling.
//!
//! Each poller owns one scope. Before every request it takes a ticket
//! from the shared sequencer, so a slow response that lands after a newer
//! one is recognised as stale by the session.

use crate::error::{AppError, AppResult};
use crate::session::SessionHandle;
use chrono::{Local, NaiveDate};
use courier_api::OrderSource;
use courier_core::PollScope;
use courier_feed::ScopeSequencer;
use courier_telemetry::Metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest pause after repeated rejected polls.
const MAX_REJECTED_BACKOFF: Duration = Duration::from_secs(60);

/// Polls one scope on an interval and feeds results to the session.
pub struct ScopePoller<S: OrderSource> {
    source: Arc<S>,
    scope: PollScope,
    interval: Duration,
    sequencer: Arc<ScopeSequencer>,
    session: SessionHandle,
    /// Immediate re-poll trigger (date scope only).
    refresh: Option<Arc<Notify>>,
    /// Move the date scope forward when the local date changes.
    follow_today: bool,
}

impl<S: OrderSource> ScopePoller<S> {
    pub fn new(
        source: Arc<S>,
        scope: PollScope,
        interval: Duration,
        sequencer: Arc<ScopeSequencer>,
        session: SessionHandle,
    ) -> Self {
        Self {
            source,
            scope,
            interval,
            sequencer,
            session,
            refresh: None,
            follow_today: false,
        }
    }

    /// Poll for today's date and roll over at midnight.
    pub fn for_today(
        source: Arc<S>,
        interval: Duration,
        sequencer: Arc<ScopeSequencer>,
        session: SessionHandle,
    ) -> Self {
        let mut poller = Self::new(
            source,
            PollScope::Date(today()),
            interval,
            sequencer,
            session,
        );
        poller.follow_today = true;
        poller
    }

    /// Re-poll immediately whenever `refresh` is notified.
    pub fn with_refresh(mut self, refresh: Arc<Notify>) -> Self {
        self.refresh = Some(refresh);
        self
    }

    pub fn scope(&self) -> &PollScope {
        &self.scope
    }

    /// Fetch once and hand the result to the session.
    ///
    /// Returns the number of accepted orders.
    pub async fn poll_once(&self) -> AppResult<usize> {
        let seq = self.sequencer.next(&self.scope);
        let label = self.scope.label().to_string();
        let started = Instant::now();

        let result = self.source.fetch(&self.scope).await;
        Metrics::poll_latency(&label, started.elapsed().as_secs_f64() * 1000.0);

        let parsed = match result {
            Ok(parsed) => parsed,
            Err(e) => {
                Metrics::poll_failed(&label);
                return Err(e.into());
            }
        };

        if !parsed.rejected.is_empty() {
            Metrics::invalid_records("poll", parsed.rejected.len());
        }

        let count = parsed.orders.len();
        debug!(scope = %self.scope, seq, count, "Poll result");
        self.session
            .replace(self.scope.clone(), seq, parsed.orders)
            .await?;
        Ok(count)
    }

    /// Move to another scope, clearing the old one.
    ///
    /// The clear goes through a fresh ticket, so an in-flight response for
    /// the old scope is discarded when it lands.
    pub async fn switch_scope(&mut self, scope: PollScope) -> AppResult<()> {
        if scope == self.scope {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.scope, scope);
        let seq = self.sequencer.next(&old);
        info!(from = %old, to = %self.scope, "Switching poll scope");
        self.session.replace(old, seq, Vec::new()).await
    }

    /// Poll until cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(scope = %self.scope, interval_ms = self.interval.as_millis(), "Poller started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let refresh = self.refresh.clone();
        let mut rejections: u32 = 0;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!(scope = %self.scope, "Shutdown requested, stopping poller");
                    break;
                }
                _ = ticker.tick() => {}
                () = wait_refresh(refresh.as_deref()) => {
                    debug!(scope = %self.scope, "Refresh triggered");
                    ticker.reset();
                }
            }

            if self.follow_today {
                let today = PollScope::Date(today());
                if let Err(e) = self.switch_scope(today).await {
                    warn!(error = %e, "Date rollover failed");
                    break;
                }
            }

            match self.poll_once().await {
                Ok(_) => rejections = 0,
                Err(AppError::SessionClosed) => {
                    info!(scope = %self.scope, "Session closed, stopping poller");
                    break;
                }
                Err(AppError::Api(e)) if !e.is_transient() => {
                    rejections = rejections.saturating_add(1);
                    let pause = rejected_backoff(self.interval, rejections);
                    warn!(
                        scope = %self.scope,
                        error = %e,
                        rejections,
                        pause_ms = pause.as_millis(),
                        "Poll rejected, backing off"
                    );
                    tokio::select! {
                        () = shutdown.cancelled() => {
                            info!(scope = %self.scope, "Shutdown requested, stopping poller");
                            break;
                        }
                        () = tokio::time::sleep(pause) => {}
                    }
                    ticker.reset();
                }
                Err(e) => {
                    warn!(scope = %self.scope, error = %e, "Poll failed");
                }
            }
        }
    }
}

async fn wait_refresh(refresh: Option<&Notify>) {
    match refresh {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}

/// Pause before polling again after `rejections` consecutive
/// non-transient failures.
fn rejected_backoff(interval: Duration, rejections: u32) -> Duration {
    let factor = 1u32 << rejections.min(6);
    interval.saturating_mul(factor).min(MAX_REJECTED_BACKOFF)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
