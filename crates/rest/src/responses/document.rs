//! JSON:API document responses.

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use storefront_jsonapi::Document;

use crate::error::RestError;

use super::JSON_API_MEDIA_TYPE;

/// Builder for a response carrying a JSON:API document.
#[derive(Debug)]
pub struct DocumentResponse {
    status: StatusCode,
    location: Option<String>,
    document: Document,
}

impl DocumentResponse {
    /// A `200 OK` response.
    pub fn ok(document: Document) -> Self {
        Self {
            status: StatusCode::OK,
            location: None,
            document,
        }
    }

    /// A `201 Created` response with a `Location` header.
    pub fn created(document: Document, location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CREATED,
            location: Some(location.into()),
            document,
        }
    }

    /// Builds the header map.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_API_MEDIA_TYPE),
        );
        if let Some(location) = &self.location {
            if let Ok(value) = HeaderValue::from_str(location) {
                headers.insert(header::LOCATION, value);
            }
        }
        headers
    }
}

impl IntoResponse for DocumentResponse {
    fn into_response(self) -> Response {
        match serde_json::to_string(&self.document) {
            Ok(body) => (self.status, self.to_header_map(), body).into_response(),
            Err(err) => RestError::InternalError {
                message: format!("Failed to serialize document: {}", err),
            }
            .into_response(),
        }
    }
}

/// A `204 No Content` response.
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
