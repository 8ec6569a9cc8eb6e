//! Socket channel subscriber for courier order events.
//!
//! Provides the real-time leg of the order feed:
//! - Automatic reconnection with exponential backoff
//! - Handshake and `driver.<id>` channel subscription
//! - Inactivity timeout driven by server pings
//! - Channel-based forwarding of parsed stream events

pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod message;

pub use connection::{ConnectionState, SocketConfig, SocketEvent, SocketSubscriber};
pub use error::{WsError, WsResult};
pub use message::{SocketMessage, SocketRequest};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any socket or HTTPS connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
