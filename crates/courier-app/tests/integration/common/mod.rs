//! Shared test fixtures.

pub mod fake_source;
pub mod mock_socket;
