//! Socket protocol frames.
//!
//! The order channel speaks a small event/ack protocol over text frames:
//! - requests are `{"event": "#handshake"|"#subscribe"|..., "data": ..., "cid": n}`
//! - acks are `{"rid": n, "data": ..., "error": ...}`
//! - channel publications are `{"event": "#publish", "data": {"channel": ..., "data": ...}}`
//! - keepalive is the bare text `#1` (server ping), answered with `#2`

use crate::error::{WsError, WsResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server keepalive ping.
pub const PING: &str = "#1";
/// Client keepalive pong.
pub const PONG: &str = "#2";

// ============================================================================
// Requests (Outgoing)
// ============================================================================

/// Outgoing protocol request.
#[derive(Debug, Clone, Serialize)]
pub struct SocketRequest {
    pub event: String,
    pub data: Value,
    /// Call id; the server echoes it as `rid` in the ack.
    pub cid: u64,
}

impl SocketRequest {
    /// Create a handshake request (anonymous; auth is out of band).
    pub fn handshake(cid: u64) -> Self {
        Self {
            event: "#handshake".to_string(),
            data: serde_json::json!({ "authToken": null }),
            cid,
        }
    }

    /// Create a channel subscribe request.
    pub fn subscribe(channel: &str, cid: u64) -> Self {
        Self {
            event: "#subscribe".to_string(),
            data: serde_json::json!({ "channel": channel }),
            cid,
        }
    }

    pub fn to_text(&self) -> WsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Messages (Incoming)
// ============================================================================

/// Raw incoming JSON frame.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    rid: Option<u64>,
    #[serde(default)]
    error: Option<Value>,
}

/// Parsed incoming frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketMessage {
    /// Keepalive ping; reply with `PONG`.
    Ping,
    /// Ack for one of our requests.
    Ack { rid: u64, error: Option<String> },
    /// Publication on a subscribed channel.
    Publish { channel: String, data: Value },
    /// Any other server event (auth token updates, etc.).
    Other { event: String },
}

impl SocketMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> WsResult<Self> {
        if text == PING {
            return Ok(Self::Ping);
        }

        let frame: RawFrame = serde_json::from_str(text)?;

        if let Some(rid) = frame.rid {
            let error = frame.error.filter(|e| !e.is_null()).map(|e| match e {
                Value::String(s) => s,
                other => other
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_string()),
            });
            return Ok(Self::Ack { rid, error });
        }

        match frame.event.as_deref() {
            Some("#publish") => {
                let channel = frame
                    .data
                    .get("channel")
                    .and_then(Value::as_str)
                    .ok_or_else(|| WsError::ParseError("publish without channel".to_string()))?
                    .to_string();
                let data = frame.data.get("data").cloned().unwrap_or(Value::Null);
                Ok(Self::Publish { channel, data })
            }
            Some(event) => Ok(Self::Other {
                event: event.to_string(),
            }),
            None => Err(WsError::ParseError(format!(
                "frame without event or rid: {text}"
            ))),
        }
    }
}

/// Channel name for a driver's order events.
pub fn driver_channel(driver_id: &str) -> String {
    format!("driver.{driver_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handshake_serialization() {
        let text = SocketRequest::handshake(1).to_text().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "#handshake");
        assert_eq!(value["cid"], 1);
        assert!(value["data"]["authToken"].is_null());
    }

    #[test]
    fn test_subscribe_serialization() {
        let text = SocketRequest::subscribe("driver.driver_abc", 2)
            .to_text()
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "#subscribe");
        assert_eq!(value["data"]["channel"], "driver.driver_abc");
    }

    #[test]
    fn test_parse_ping() {
        assert_eq!(SocketMessage::parse("#1").unwrap(), SocketMessage::Ping);
    }

    #[test]
    fn test_parse_ack() {
        let msg = SocketMessage::parse(r#"{"rid": 2, "data": null}"#).unwrap();
        assert_eq!(msg, SocketMessage::Ack { rid: 2, error: None });

        let msg = SocketMessage::parse(
            r#"{"rid": 2, "error": {"name": "BrokerError", "message": "not allowed"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            SocketMessage::Ack {
                rid: 2,
                error: Some("not allowed".to_string())
            }
        );
    }

    #[test]
    fn test_parse_publish() {
        let text = json!({
            "event": "#publish",
            "data": {
                "channel": "driver.driver_abc",
                "data": {"event": "order.ready", "data": {"id": "order_1"}}
            }
        })
        .to_string();

        match SocketMessage::parse(&text).unwrap() {
            SocketMessage::Publish { channel, data } => {
                assert_eq!(channel, "driver.driver_abc");
                assert_eq!(data["event"], "order.ready");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_other_and_invalid() {
        let msg = SocketMessage::parse(r##"{"event": "#setAuthToken", "data": {}}"##).unwrap();
        assert_eq!(
            msg,
            SocketMessage::Other {
                event: "#setAuthToken".to_string()
            }
        );

        assert!(SocketMessage::parse(r#"{"data": {}}"#).is_err());
        assert!(SocketMessage::parse(r##"{"event": "#publish", "data": {}}"##).is_err());
        assert!(SocketMessage::parse("not json").is_err());
    }

    #[test]
    fn test_driver_channel() {
        assert_eq!(driver_channel("driver_abc"), "driver.driver_abc");
    }
}
