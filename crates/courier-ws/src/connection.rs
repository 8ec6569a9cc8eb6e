//! Socket subscriber.
//!
//! Handles connection lifecycle, automatic reconnection with exponential
//! backoff, and re-subscription to the driver channel after reconnection.
//! Publications on the channel are classified into `StreamEvent`s and
//! forwarded downstream; nothing here touches the feed directly.

use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatManager;
use crate::message::{SocketMessage, SocketRequest, PONG};
use courier_feed::StreamEvent;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Call id of the handshake request.
const HANDSHAKE_CID: u64 = 1;
/// Call id of the channel subscribe request.
const SUBSCRIBE_CID: u64 = 2;

/// Socket configuration.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Socket URL.
    pub url: String,
    /// Channel to subscribe to (e.g. "driver.driver_abc").
    pub channel: String,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Silence after which the connection is considered dead.
    pub heartbeat_timeout_ms: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            channel: String::new(),
            max_reconnect_attempts: 0, // Infinite
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60000,
            heartbeat_timeout_ms: 20000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
    Reconnecting,
}

/// Event forwarded to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// Channel subscription acknowledged. Events published while we
    /// were away are lost, so the session should re-poll.
    Subscribed,
    /// Connection lost; a reconnect may follow.
    Disconnected { reason: String },
    /// Parsed publication on the driver channel.
    Stream(StreamEvent),
    /// Publication that could not be turned into a stream event.
    Rejected { reason: String },
}

/// Socket subscriber for the driver order channel.
pub struct SocketSubscriber {
    config: SocketConfig,
    state: Arc<RwLock<ConnectionState>>,
    heartbeat: Arc<HeartbeatManager>,
    event_tx: mpsc::Sender<SocketEvent>,
    reconnect_count: Arc<RwLock<u32>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl SocketSubscriber {
    /// Create a new subscriber.
    pub fn new(config: SocketConfig, event_tx: mpsc::Sender<SocketEvent>) -> Self {
        let heartbeat = Arc::new(HeartbeatManager::new(config.heartbeat_timeout_ms));
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            heartbeat,
            event_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Use an externally owned token (e.g. the application's shutdown token).
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Number of consecutive failed connection attempts.
    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Signal graceful shutdown.
    pub fn shutdown(&self) {
        info!("SocketSubscriber shutdown requested");
        self.shutdown_token.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect, subscribe, and forward events until shutdown.
    pub async fn run(&self) -> WsResult<()> {
        self.connect_with_retry().await
    }

    async fn connect_with_retry(&self) -> WsResult<()> {
        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;

            let reason = match self.try_connect().await {
                Ok(()) => {
                    info!("Socket connection closed");
                    "closed".to_string()
                }
                Err(e) => {
                    error!(?e, "Socket connection error");
                    e.to_string()
                }
            };

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            self.forward(SocketEvent::Disconnected { reason }).await;

            // A session that reached Subscribed resets the counter in try_connect.
            let attempt = *self.reconnect_count.read() + 1;
            *self.reconnect_count.write() = attempt;

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                *self.state.write() = ConnectionState::Disconnected;
                return Err(WsError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            *self.state.write() = ConnectionState::Reconnecting;

            let delay = self.calculate_backoff_delay(attempt);
            warn!(attempt, delay_ms = delay.as_millis(), "Reconnecting");

            // Wait for delay OR shutdown signal
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self) -> WsResult<()> {
        info!(url = %self.config.url, channel = %self.config.channel, "Connecting to socket");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.url, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        *self.state.write() = ConnectionState::Connected;
        self.heartbeat.reset();
        info!("Socket connected");

        write
            .send(Message::Text(SocketRequest::handshake(HANDSHAKE_CID).to_text()?))
            .await?;
        write
            .send(Message::Text(
                SocketRequest::subscribe(&self.config.channel, SUBSCRIBE_CID).to_text()?,
            ))
            .await?;

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.heartbeat.record_message();
                            if let Some(reply) = self.handle_text_message(&text).await? {
                                write.send(Message::Text(reply)).await?;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            self.heartbeat.record_message();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Socket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "Socket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("Socket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                () = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_timed_out() {
                        error!(
                            silent_ms = self.heartbeat.time_since_last_message_ms(),
                            "Heartbeat timeout"
                        );
                        return Err(WsError::HeartbeatTimeout);
                    }
                }
            }
        }
    }

    /// Handle one text frame. Returns a reply frame, if any.
    async fn handle_text_message(&self, text: &str) -> WsResult<Option<String>> {
        let msg = match SocketMessage::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                // One bad frame is not worth a reconnect.
                warn!(error = %e, "Ignoring unparseable socket frame");
                return Ok(None);
            }
        };

        match msg {
            SocketMessage::Ping => {
                self.heartbeat.record_ping();
                return Ok(Some(PONG.to_string()));
            }
            SocketMessage::Ack { rid, error } => {
                process_ack(rid, error.as_deref(), &self.config.channel)?;
                if rid == SUBSCRIBE_CID {
                    *self.state.write() = ConnectionState::Subscribed;
                    *self.reconnect_count.write() = 0;
                    info!(channel = %self.config.channel, "Channel subscribed");
                    self.forward(SocketEvent::Subscribed).await;
                }
            }
            SocketMessage::Publish { channel, data } => {
                if channel != self.config.channel {
                    debug!(%channel, "Publication on foreign channel, ignoring");
                    return Ok(None);
                }
                let event = match StreamEvent::from_channel_data(&data) {
                    Ok(event) => SocketEvent::Stream(event),
                    Err(e) => {
                        warn!(error = %e, "Rejected channel publication");
                        SocketEvent::Rejected {
                            reason: e.to_string(),
                        }
                    }
                };
                self.forward(event).await;
            }
            SocketMessage::Other { event } => {
                debug!(%event, "Ignoring server event");
            }
        }

        Ok(None)
    }

    async fn forward(&self, event: SocketEvent) {
        if self.event_tx.send(event).await.is_err() {
            warn!("Socket event receiver dropped");
        }
    }

    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        backoff_delay(
            self.config.reconnect_base_delay_ms,
            self.config.reconnect_max_delay_ms,
            attempt,
        ) + Duration::from_millis(rand_jitter())
    }
}

/// Exponential backoff: base * 2^(attempt-1), capped at `max_ms`.
fn backoff_delay(base_ms: u64, max_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let delay = base_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(delay.min(max_ms))
}

/// Generate random jitter (0-1000ms).
fn rand_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as u64
}

/// Check an ack for our handshake/subscribe calls.
///
/// A refused subscription is fatal for this connection attempt.
fn process_ack(rid: u64, error: Option<&str>, channel: &str) -> WsResult<()> {
    match (rid, error) {
        (SUBSCRIBE_CID, Some(err)) => Err(WsError::SubscriptionError(format!(
            "{channel}: {err}"
        ))),
        (HANDSHAKE_CID, Some(err)) => {
            warn!(error = %err, "Handshake rejected, continuing anonymously");
            Ok(())
        }
        (_, _) => {
            debug!(rid, "Ack received");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SocketConfig::default();
        assert_eq!(config.max_reconnect_attempts, 0); // Infinite
        assert_eq!(config.heartbeat_timeout_ms, 20000);
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        assert_eq!(backoff_delay(1000, 60000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 60000, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 60000, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(1000, 60000, 20), Duration::from_millis(60000));
    }

    #[test]
    fn test_process_ack_subscribe_error_is_fatal() {
        let err = process_ack(SUBSCRIBE_CID, Some("not allowed"), "driver.x").unwrap_err();
        assert!(matches!(err, WsError::SubscriptionError(_)));
    }

    #[test]
    fn test_process_ack_handshake_error_tolerated() {
        assert!(process_ack(HANDSHAKE_CID, Some("bad token"), "driver.x").is_ok());
        assert!(process_ack(SUBSCRIBE_CID, None, "driver.x").is_ok());
    }

    #[tokio::test]
    async fn test_publish_forwarded_as_stream_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let subscriber = SocketSubscriber::new(
            SocketConfig {
                channel: "driver.abc".to_string(),
                ..Default::default()
            },
            tx,
        );

        let frame = serde_json::json!({
            "event": "#publish",
            "data": {
                "channel": "driver.abc",
                "data": {
                    "event": "order.ready",
                    "data": {"id": "order_1", "status": "created", "created_at": "2024-05-01T08:30:00Z"}
                }
            }
        })
        .to_string();

        let reply = subscriber.handle_text_message(&frame).await.unwrap();
        assert!(reply.is_none());

        match rx.recv().await.unwrap() {
            SocketEvent::Stream(StreamEvent::OrderReady(order)) => {
                assert_eq!(order.id.as_str(), "order_1");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ping_answered_and_foreign_channel_ignored() {
        let (tx, mut rx) = mpsc::channel(8);
        let subscriber = SocketSubscriber::new(
            SocketConfig {
                channel: "driver.abc".to_string(),
                ..Default::default()
            },
            tx,
        );

        let reply = subscriber.handle_text_message("#1").await.unwrap();
        assert_eq!(reply.as_deref(), Some(PONG));

        let foreign = r##"{"event": "#publish", "data": {"channel": "driver.other", "data": {"event": "order.ready"}}}"##;
        subscriber.handle_text_message(foreign).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribe_ack_marks_subscribed() {
        let (tx, mut rx) = mpsc::channel(8);
        let subscriber = SocketSubscriber::new(
            SocketConfig {
                channel: "driver.abc".to_string(),
                ..Default::default()
            },
            tx,
        );
        *subscriber.reconnect_count.write() = 3;

        subscriber
            .handle_text_message(r#"{"rid": 2}"#)
            .await
            .unwrap();

        assert_eq!(subscriber.state(), ConnectionState::Subscribed);
        assert_eq!(subscriber.reconnect_count(), 0);
        assert_eq!(rx.recv().await.unwrap(), SocketEvent::Subscribed);
    }

    #[tokio::test]
    async fn test_invalid_order_publication_rejected() {
        let (tx, mut rx) = mpsc::channel(8);
        let subscriber = SocketSubscriber::new(
            SocketConfig {
                channel: "driver.abc".to_string(),
                ..Default::default()
            },
            tx,
        );

        let frame = r##"{"event": "#publish", "data": {"channel": "driver.abc", "data": {"event": "order.ready", "data": {"status": "created"}}}}"##;
        subscriber.handle_text_message(frame).await.unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            SocketEvent::Rejected { .. }
        ));
    }
}
