//! Mock channel socket server for integration tests.
//!
//! Provides a WebSocket server that can:
//! - Accept connections and ack handshake/subscribe requests
//! - Ping clients after subscription
//! - Publish events on a channel to every connected client
//! - Drop all connections to exercise reconnection
//! - Record received messages

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Pushed to connection handlers.
#[derive(Debug, Clone)]
enum Control {
    Send(String),
    Close,
}

/// A mock channel socket server for testing.
pub struct MockSocketServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    control_tx: broadcast::Sender<Control>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
}

impl MockSocketServer {
    /// Start a server that accepts subscriptions.
    pub async fn start() -> Self {
        Self::start_with(false).await
    }

    /// Start a server that refuses every channel subscription.
    pub async fn start_rejecting() -> Self {
        Self::start_with(true).await
    }

    async fn start_with(reject_subscribe: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let connections: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (control_tx, _) = broadcast::channel::<Control>(64);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();
        let control_clone = control_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            messages_clone.clone(),
                            connections_clone.clone(),
                            control_clone.subscribe(),
                            reject_subscribe,
                        ));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            control_tx,
            messages,
            connections,
        }
    }

    /// Get the server's socket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Get the number of connections received.
    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    /// Get all received messages.
    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    /// Publish `data` on `channel` to every connected client.
    pub fn publish(&self, channel: &str, data: Value) {
        let frame = json!({
            "event": "#publish",
            "data": {"channel": channel, "data": data}
        });
        let _ = self.control_tx.send(Control::Send(frame.to_string()));
    }

    /// Close every open connection from the server side.
    pub fn disconnect_all(&self) {
        let _ = self.control_tx.send(Control::Close);
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
    mut control_rx: broadcast::Receiver<Control>,
    reject_subscribe: bool,
) {
    {
        let mut count = connections.lock().await;
        *count += 1;
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        messages.lock().await.push_back(text.clone());

                        let Ok(parsed) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        let cid = parsed.get("cid").cloned().unwrap_or(Value::Null);
                        match parsed.get("event").and_then(Value::as_str) {
                            Some("#handshake") => {
                                let ack = json!({
                                    "rid": cid,
                                    "data": {"id": "mock", "isAuthenticated": false, "pingTimeout": 20000}
                                });
                                let _ = write.send(Message::Text(ack.to_string())).await;
                            }
                            Some("#subscribe") => {
                                let ack = if reject_subscribe {
                                    json!({"rid": cid, "error": {"name": "BrokerError", "message": "denied"}})
                                } else {
                                    json!({"rid": cid})
                                };
                                let _ = write.send(Message::Text(ack.to_string())).await;
                                if !reject_subscribe {
                                    let _ = write.send(Message::Text("#1".to_string())).await;
                                }
                            }
                            _ => {}
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            control = control_rx.recv() => {
                match control {
                    Ok(Control::Send(text)) => {
                        let _ = write.send(Message::Text(text)).await;
                    }
                    Ok(Control::Close) | Err(_) => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockSocketServer::start().await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        server.shutdown().await;
    }
}
