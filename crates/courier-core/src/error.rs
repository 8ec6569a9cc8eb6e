//! Error types for courier-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Date parse error: {0}")]
    DateParse(#[from] chrono::ParseError),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
