//! Socket lifecycle integration tests.
//!
//! Tests the subscriber against a mock channel server:
//! - Handshake and subscription
//! - Event forwarding and ping replies
//! - Reconnection and shutdown

mod integration;
use integration::common::mock_socket::MockSocketServer;

use courier_feed::StreamEvent;
use courier_ws::{ConnectionState, SocketConfig, SocketEvent, SocketSubscriber};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn config(url: String) -> SocketConfig {
    SocketConfig {
        url,
        channel: "driver.driver_abc".to_string(),
        reconnect_base_delay_ms: 10,
        reconnect_max_delay_ms: 50,
        ..Default::default()
    }
}

/// Wait for the first event matching `pred`.
async fn wait_for(
    rx: &mut mpsc::Receiver<SocketEvent>,
    pred: impl Fn(&SocketEvent) -> bool,
) -> SocketEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for socket event")
}

#[tokio::test]
async fn test_subscribes_and_forwards_order_ready() {
    let server = MockSocketServer::start().await;
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let subscriber = Arc::new(SocketSubscriber::new(config(server.url()), event_tx));

    let runner = subscriber.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    wait_for(&mut event_rx, |e| *e == SocketEvent::Subscribed).await;
    assert_eq!(subscriber.state(), ConnectionState::Subscribed);

    server.publish(
        "driver.driver_abc",
        json!({
            "event": "order.ready",
            "data": {"id": "order_1", "status": "created", "created_at": "2024-05-01T08:30:00Z"}
        }),
    );

    match wait_for(&mut event_rx, |e| matches!(e, SocketEvent::Stream(_))).await {
        SocketEvent::Stream(StreamEvent::OrderReady(order)) => {
            assert_eq!(order.id.as_str(), "order_1");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Server ping after subscribe is answered.
    let messages = timeout(Duration::from_secs(2), async {
        loop {
            let messages = server.received_messages().await;
            if messages.iter().any(|m| m == "#2") {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("pong not received");
    assert!(messages.iter().any(|m| m.contains("#handshake")));
    assert!(messages
        .iter()
        .any(|m| m.contains("#subscribe") && m.contains("driver.driver_abc")));

    subscriber.shutdown();
    let result = timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    assert!(result.is_ok());
    server.shutdown().await;
}

#[tokio::test]
async fn test_other_channels_and_lifecycle_events() {
    let server = MockSocketServer::start().await;
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let subscriber = Arc::new(SocketSubscriber::new(config(server.url()), event_tx));

    let runner = subscriber.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    wait_for(&mut event_rx, |e| *e == SocketEvent::Subscribed).await;

    server.publish("driver.someone_else", json!({"event": "order.ready", "data": {}}));
    server.publish(
        "driver.driver_abc",
        json!({"event": "order.canceled", "data": {"id": "order_1"}}),
    );

    let event = wait_for(&mut event_rx, |e| matches!(e, SocketEvent::Stream(_))).await;
    assert_eq!(
        event,
        SocketEvent::Stream(StreamEvent::RefreshRequested {
            reason: "order.canceled".to_string()
        })
    );

    subscriber.shutdown();
    let _ = timeout(Duration::from_secs(2), handle).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let server = MockSocketServer::start().await;
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let subscriber = Arc::new(SocketSubscriber::new(config(server.url()), event_tx));

    let runner = subscriber.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    wait_for(&mut event_rx, |e| *e == SocketEvent::Subscribed).await;
    server.disconnect_all();

    wait_for(&mut event_rx, |e| matches!(e, SocketEvent::Disconnected { .. })).await;
    wait_for(&mut event_rx, |e| *e == SocketEvent::Subscribed).await;

    assert!(server.connection_count().await >= 2);
    assert_eq!(subscriber.reconnect_count(), 0);

    subscriber.shutdown();
    let _ = timeout(Duration::from_secs(2), handle).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_rejected_subscription_gives_up_after_max_attempts() {
    let server = MockSocketServer::start_rejecting().await;
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let subscriber = SocketSubscriber::new(
        SocketConfig {
            max_reconnect_attempts: 1,
            ..config(server.url())
        },
        event_tx,
    );

    let result = timeout(Duration::from_secs(5), subscriber.run())
        .await
        .expect("subscriber should give up");
    assert!(result.is_err());
    assert_eq!(subscriber.state(), ConnectionState::Disconnected);

    let event = event_rx.recv().await.unwrap();
    match event {
        SocketEvent::Disconnected { reason } => assert!(reason.contains("denied")),
        other => panic!("unexpected event: {other:?}"),
    }
    server.shutdown().await;
}
