//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Socket error: {0}")]
    Socket(#[from] courier_ws::WsError),

    #[error("Feed error: {0}")]
    Feed(#[from] courier_feed::FeedError),

    #[error("API error: {0}")]
    Api(#[from] courier_api::ApiError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] courier_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed session closed")]
    SessionClosed,
}

pub type AppResult<T> = Result<T, AppError>;
