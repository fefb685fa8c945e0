//! Response formatting.
//!
//! - [`document`] - JSON:API document responses and `204 No Content`

pub mod document;

pub use document::{DocumentResponse, no_content};

/// The JSON:API media type.
pub const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";
