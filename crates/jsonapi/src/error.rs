//! Error types for the JSON:API engine.
//!
//! Every failure that reaches a client is rendered as a list of
//! [`ErrorObject`]s sharing one HTTP status:
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 422 |
//! | InvalidQuery | 400 |
//! | NotFound | 404 |
//! | UnknownResourceType | 500 |
//! | UnregisteredRelationship | 500 |
//! | CardinalityMismatch | 500 |
//! | Storage | 500 |

use serde::{Deserialize, Serialize};
use storefront_persistence::error::{ResourceError, StorageError};
use thiserror::Error;

use crate::registry::Cardinality;

/// Title shared by every field and query-parameter error.
pub const VALIDATION_TITLE: &str = "Validation Error";

/// Title of the not-found error object.
pub const NOT_FOUND_TITLE: &str = "Not Found";

/// Details of the not-found error object.
pub const NOT_FOUND_DETAILS: &str = "Resource not found";

/// Title of internal error objects.
pub const INTERNAL_TITLE: &str = "Internal Server Error";

/// Where in the request an error originated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    /// JSON pointer into the request document, e.g. `/data/attributes/name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,

    /// Offending query parameter, e.g. `sort`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// A single JSON:API error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub title: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
}

impl ErrorObject {
    /// A field validation error. `path` is the dotted path of the field.
    pub fn field(path: &str, details: impl Into<String>) -> Self {
        Self {
            title: VALIDATION_TITLE.to_string(),
            details: details.into(),
            source: Some(ErrorSource {
                pointer: Some(format!("/{}", path.replace('.', "/"))),
                parameter: None,
            }),
        }
    }

    /// A query parameter error.
    pub fn parameter(parameter: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            title: VALIDATION_TITLE.to_string(),
            details: details.into(),
            source: Some(ErrorSource {
                pointer: None,
                parameter: Some(parameter.into()),
            }),
        }
    }

    /// The generic not-found error.
    pub fn not_found() -> Self {
        Self {
            title: NOT_FOUND_TITLE.to_string(),
            details: NOT_FOUND_DETAILS.to_string(),
            source: None,
        }
    }

    /// An internal error carrying a message.
    pub fn internal(details: impl Into<String>) -> Self {
        Self {
            title: INTERNAL_TITLE.to_string(),
            details: details.into(),
            source: None,
        }
    }

    /// Returns the source pointer, if any.
    pub fn pointer(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.pointer.as_deref())
    }
}

/// The primary error type of the engine.
#[derive(Error, Debug)]
pub enum JsonApiError {
    /// One or more request document fields violated their rules.
    #[error("validation failed with {} error(s)", .0.len())]
    Validation(Vec<ErrorObject>),

    /// One or more query parameters were rejected.
    #[error("invalid query parameters ({} error(s))", .0.len())]
    InvalidQuery(Vec<ErrorObject>),

    /// A primary resource or relationship target does not exist.
    #[error("resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    /// The resource type has no schema.
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    /// The relationship is not declared on the schema.
    #[error("relationship '{relationship}' is not registered on {resource_type}")]
    UnregisteredRelationship {
        resource_type: String,
        relationship: String,
    },

    /// A to-one operation was applied to a to-many relationship or vice versa.
    #[error("relationship '{relationship}' on {resource_type} is {actual}, not {expected}")]
    CardinalityMismatch {
        resource_type: String,
        relationship: String,
        expected: Cardinality,
        actual: Cardinality,
    },

    /// Any other storage failure.
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for JsonApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Resource(ResourceError::NotFound { resource_type, id }) => {
                JsonApiError::NotFound { resource_type, id }
            }
            other => JsonApiError::Storage(other),
        }
    }
}

impl JsonApiError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            JsonApiError::Validation(_) => 422,
            JsonApiError::InvalidQuery(_) => 400,
            JsonApiError::NotFound { .. } => 404,
            JsonApiError::Storage(e) if e.is_not_found() => 404,
            JsonApiError::UnknownResourceType(_)
            | JsonApiError::UnregisteredRelationship { .. }
            | JsonApiError::CardinalityMismatch { .. }
            | JsonApiError::Storage(_) => 500,
        }
    }

    /// Returns true for programming and backend errors.
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }

    /// Error objects for the response body.
    pub fn error_objects(&self) -> Vec<ErrorObject> {
        match self {
            JsonApiError::Validation(errors) | JsonApiError::InvalidQuery(errors) => errors.clone(),
            JsonApiError::NotFound { .. } => vec![ErrorObject::not_found()],
            other if other.status_code() == 404 => vec![ErrorObject::not_found()],
            other => vec![ErrorObject::internal(other.to_string())],
        }
    }

    /// Not-found error for a resource.
    pub fn not_found(resource_type: &str, id: &str) -> Self {
        JsonApiError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }
}

/// Result type alias for engine operations.
pub type JsonApiResult<T> = Result<T, JsonApiError>;
