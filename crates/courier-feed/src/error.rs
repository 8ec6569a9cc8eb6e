//! Feed error types.

use courier_core::{CoreError, PollScope};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Record without a usable identifier; never enters the feed.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Poll result older than one already applied to the same scope.
    #[error("Stale update for {scope}: seq {seq} < applied {applied}")]
    StaleScopeUpdate {
        scope: PollScope,
        seq: u64,
        applied: u64,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CoreError> for FeedError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidRecord(msg) => Self::InvalidRecord(msg),
            other => Self::ParseError(other.to_string()),
        }
    }
}

impl FeedError {
    /// Whether the error is the non-fatal stale-poll case.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleScopeUpdate { .. })
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
