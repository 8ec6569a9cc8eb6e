//! Prometheus metrics and structured logging for the courier order feed.
//!
//! - Prometheus metrics for feed size, alert state, poll and socket health
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with_default};
pub use metrics::Metrics;
