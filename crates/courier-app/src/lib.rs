//! Courier order feed.
//!
//! Keeps a driver's order list current by merging three sources:
//! - the date poll (the driver's orders for the selected day)
//! - the nearby poll (unassigned ad-hoc orders around the driver)
//! - the socket channel (orders pushed as soon as they are ready)
//!
//! Device push notifications re-poll the date scope.
//!
//! and derives whether the new-order alert should be sounding.

pub mod alert;
pub mod app;
pub mod config;
pub mod error;
pub mod poller;
pub mod session;

pub use alert::{AlertMonitor, AlertTransition};
pub use app::{Application, Notifier};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use poller::ScopePoller;
pub use session::{FeedCommand, FeedSession, FeedSnapshot, SessionHandle};
