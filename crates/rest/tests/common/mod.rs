//! Common test utilities for HTTP API testing.
//!
//! - [`harness`] - Test server over an in-memory database
//! - [`assertions`] - JSON:API response assertions

pub mod assertions;
pub mod harness;
