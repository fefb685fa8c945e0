//! Error types for the HTTP transport.
//!
//! Every error is rendered as a JSON:API error document
//! (`{"errors": [...]}`) with the `application/vnd.api+json` media type.
//!
//! # Error Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | JsonApi | per [`JsonApiError::status_code`] |
//! | NotFound | 404 |
//! | BadRequest | 400 |
//! | NotAcceptable | 406 |
//! | UnsupportedMediaType | 415 |
//! | InternalError | 500 |

use std::fmt;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use storefront_jsonapi::error::{ErrorObject, JsonApiError};
use storefront_persistence::error::StorageError;

use crate::responses::JSON_API_MEDIA_TYPE;

/// The primary error type for transport operations.
#[derive(Debug)]
pub enum RestError {
    /// An error raised by the JSON:API engine.
    JsonApi(JsonApiError),

    /// The URL names no known resource type or relationship (HTTP 404).
    NotFound,

    /// The request body is not a JSON document (HTTP 400).
    BadRequest {
        /// Error message.
        message: String,
    },

    /// The `Accept` header only offers parameterized JSON:API media types (HTTP 406).
    NotAcceptable {
        /// Error message.
        message: String,
    },

    /// The request body carries an unsupported `Content-Type` (HTTP 415).
    UnsupportedMediaType {
        /// The unsupported content type.
        content_type: String,
    },

    /// Internal server error (HTTP 500).
    InternalError {
        /// Error message.
        message: String,
    },
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::JsonApi(err) => write!(f, "{}", err),
            RestError::NotFound => write!(f, "Resource not found"),
            RestError::BadRequest { message } => write!(f, "Bad request: {}", message),
            RestError::NotAcceptable { message } => write!(f, "Not acceptable: {}", message),
            RestError::UnsupportedMediaType { content_type } => {
                write!(f, "Unsupported media type: {}", content_type)
            }
            RestError::InternalError { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for RestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RestError::JsonApi(err) => Some(err),
            _ => None,
        }
    }
}

impl RestError {
    /// HTTP status of this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::JsonApi(err) => StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            RestError::NotFound => StatusCode::NOT_FOUND,
            RestError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            RestError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            RestError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RestError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error objects of the response body.
    pub fn error_objects(&self) -> Vec<ErrorObject> {
        let single = |title: &str, details: String| ErrorObject {
            title: title.to_string(),
            details,
            source: None,
        };
        match self {
            RestError::JsonApi(err) => err.error_objects(),
            RestError::NotFound => vec![ErrorObject::not_found()],
            RestError::BadRequest { message } => vec![single("Bad Request", message.clone())],
            RestError::NotAcceptable { message } => vec![single("Not Acceptable", message.clone())],
            RestError::UnsupportedMediaType { content_type } => vec![single(
                "Unsupported Media Type",
                format!(
                    "Content type '{}' is not supported, use '{}'",
                    content_type, JSON_API_MEDIA_TYPE
                ),
            )],
            RestError::InternalError { message } => vec![ErrorObject::internal(message.clone())],
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = serde_json::json!({ "errors": self.error_objects() });
        (
            status,
            [(header::CONTENT_TYPE, JSON_API_MEDIA_TYPE)],
            body.to_string(),
        )
            .into_response()
    }
}

impl From<JsonApiError> for RestError {
    fn from(err: JsonApiError) -> Self {
        RestError::JsonApi(err)
    }
}

impl From<StorageError> for RestError {
    fn from(err: StorageError) -> Self {
        RestError::JsonApi(err.into())
    }
}

/// Result type alias for transport operations.
pub type RestResult<T> = Result<T, RestError>;

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_persistence::error::ResourceError;

    #[test]
    fn test_status_codes() {
        assert_eq!(RestError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            RestError::UnsupportedMediaType {
                content_type: "application/json".into()
            }
            .status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            RestError::from(JsonApiError::Validation(vec![])).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_storage_not_found_is_404() {
        let err = RestError::from(StorageError::from(ResourceError::NotFound {
            resource_type: "shops".into(),
            id: "1".into(),
        }));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_objects(), vec![ErrorObject::not_found()]);
    }

    #[test]
    fn test_response_media_type() {
        let response = RestError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            JSON_API_MEDIA_TYPE
        );
    }

    #[test]
    fn test_display() {
        let err = RestError::BadRequest {
            message: "expected value at line 1".into(),
        };
        assert_eq!(err.to_string(), "Bad request: expected value at line 1");
    }
}
