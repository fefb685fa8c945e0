//! Axum extractors for JSON:API requests.
//!
//! - [`JsonApiDocument`] - Parse the request body as a JSON document
//! - [`QueryParams`] - Decode the query string into ordered pairs

mod json_api_document;
mod query_params;

pub use json_api_document::{JsonApiDocument, JsonApiDocumentRejection};
pub use query_params::QueryParams;
