//! API error types.

use courier_feed::FeedError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unauthorized: check the API key")]
    Unauthorized,

    #[error("Response parse error: {0}")]
    Parse(#[from] FeedError),
}

impl ApiError {
    /// Whether retrying on the next tick may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpClient(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Unauthorized | Self::Parse(_) => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
