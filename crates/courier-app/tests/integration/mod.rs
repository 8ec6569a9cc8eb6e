//! Integration tests for the courier order feed.
//!
//! These tests verify the interaction between components:
//! - Socket subscription lifecycle against a mock server
//! - Pollers, socket events and the session actor together
//! - Application start-up and shutdown

pub mod common;
