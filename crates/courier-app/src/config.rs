//! Application configuration.

use crate::error::{AppError, AppResult};
use chrono::NaiveDate;
use courier_ws::{message::driver_channel, SocketConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the config file path.
pub const CONFIG_ENV: &str = "COURIER_CONFIG";
/// Environment variable holding the API key; overrides `api.key`.
pub const API_KEY_ENV: &str = "COURIER_API_KEY";
/// Config file used when neither the CLI nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Order API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API host, without the `/v1` suffix.
    #[serde(default = "default_api_host")]
    pub host: String,
    /// Bearer key. Prefer `COURIER_API_KEY` over putting it in the file.
    #[serde(default)]
    pub key: String,
    /// Request timeout (ms). Default: 10,000.
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_host() -> String {
    "http://localhost:8000".to_string()
}

fn default_api_timeout_ms() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            key: String::new(),
            timeout_ms: default_api_timeout_ms(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// API key, with the environment taking precedence over the file.
    pub fn resolved_key(&self) -> String {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| self.key.clone())
    }
}

/// Socket configuration subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketSettings {
    /// Whether to subscribe to the driver channel at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Socket endpoint.
    #[serde(default = "default_socket_url")]
    pub url: String,
    /// Maximum reconnection attempts (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Base delay for reconnection backoff (ms).
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Cap for reconnection backoff (ms).
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Silence before the connection is dropped (ms).
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_socket_url() -> String {
    "ws://localhost:38000/socketcluster/".to_string()
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    20_000
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_socket_url(),
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
        }
    }
}

impl SocketSettings {
    /// Subscriber config for a driver's channel.
    pub fn to_socket_config(&self, driver_id: &str) -> SocketConfig {
        SocketConfig {
            url: self.url.clone(),
            channel: driver_channel(driver_id),
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_base_delay_ms: self.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.reconnect_max_delay_ms,
            heartbeat_timeout_ms: self.heartbeat_timeout_ms,
        }
    }
}

/// Polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Date scope poll interval (ms). Default: 3,000.
    #[serde(default = "default_poll_interval_ms")]
    pub date_interval_ms: u64,
    /// Nearby scope poll interval (ms). Default: 3,000.
    #[serde(default = "default_poll_interval_ms")]
    pub nearby_interval_ms: u64,
    /// Poll the nearby ad-hoc pool. Off for drivers without ad-hoc work.
    #[serde(default = "default_true")]
    pub nearby_enabled: bool,
    /// Fixed date to poll instead of today (local time).
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            date_interval_ms: default_poll_interval_ms(),
            nearby_interval_ms: default_poll_interval_ms(),
            nearby_enabled: true,
            date: None,
        }
    }
}

impl PollConfig {
    pub fn date_interval(&self) -> Duration {
        Duration::from_millis(self.date_interval_ms)
    }

    pub fn nearby_interval(&self) -> Duration {
        Duration::from_millis(self.nearby_interval_ms)
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info,courier=debug".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Driver whose orders are tracked.
    #[serde(default)]
    pub driver_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub socket: SocketSettings,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from `COURIER_CONFIG` or the default path,
    /// falling back to defaults when the file does not exist.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reject configurations the session cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.driver_id.trim().is_empty() {
            return Err(AppError::Config("driver_id must be set".to_string()));
        }
        if self.api.host.trim().is_empty() {
            return Err(AppError::Config("api.host must be set".to_string()));
        }
        if self.api.timeout_ms == 0 {
            return Err(AppError::Config("api.timeout_ms must be > 0".to_string()));
        }
        if self.poll.date_interval_ms == 0 || self.poll.nearby_interval_ms == 0 {
            return Err(AppError::Config(
                "poll intervals must be > 0".to_string(),
            ));
        }
        if self.socket.enabled && self.socket.url.trim().is_empty() {
            return Err(AppError::Config(
                "socket.url must be set when the socket is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
