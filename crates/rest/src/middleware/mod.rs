//! HTTP middleware.
//!
//! - [`media_type`] - JSON:API `Content-Type` and `Accept` enforcement

pub mod media_type;

pub use media_type::enforce_media_type;
