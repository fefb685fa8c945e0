//! Error types for the persistence layer.
//!
//! Errors are split by category: record state errors, request validation
//! errors raised before any SQL runs, and backend failures.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Record state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StorageError {
    /// Returns true when the error means a record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Resource(ResourceError::NotFound { .. }))
    }
}

/// Errors related to record state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested record was not found (or is soft-deleted).
    #[error("resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    /// The record is not soft-deleted, so there is nothing to restore.
    #[error("resource is not deleted: {resource_type}/{id}")]
    NotDeleted { resource_type: String, id: String },
}

/// Errors raised when a request refers to something the catalogue does not know.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The resource type has no table in the catalogue.
    #[error("unsupported resource type: {resource_type}")]
    UnsupportedResourceType { resource_type: String },

    /// The column does not exist on the table.
    #[error("unknown column '{column}' on {resource_type}")]
    UnknownColumn {
        resource_type: String,
        column: String,
    },

    /// The relation is not declared for the table.
    #[error("unknown relation '{relation}' on {resource_type}")]
    UnknownRelation {
        resource_type: String,
        relation: String,
    },

    /// The relation exists but has the wrong kind for the operation.
    #[error("relation '{relation}' on {resource_type} is not {expected}")]
    RelationKindMismatch {
        resource_type: String,
        relation: String,
        expected: &'static str,
    },

    /// A value cannot be stored in the column.
    #[error("invalid value for column '{column}': {message}")]
    InvalidValue { column: String, message: String },
}

/// Backend-specific errors.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StorageError::from(ResourceError::NotFound {
            resource_type: "shops".to_string(),
            id: "7".to_string(),
        });
        assert_eq!(err.to_string(), "resource not found: shops/7");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_backend_error_is_not_not_found() {
        let err = StorageError::from(BackendError::QueryError {
            message: "syntax error".to_string(),
        });
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "query execution failed: syntax error");
    }

    #[test]
    fn test_unknown_column_display() {
        let err = ValidationError::UnknownColumn {
            resource_type: "brands".to_string(),
            column: "created_at".to_string(),
        };
        assert_eq!(err.to_string(), "unknown column 'created_at' on brands");
    }
}
