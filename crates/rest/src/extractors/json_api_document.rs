//! Request document extractor.
//!
//! Parses the request body as JSON. Media type checks happen in
//! [`crate::middleware::media_type`]; validating the document's structure is
//! the engine's job.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::error::RestError;

/// Axum extractor for a JSON:API request document.
#[derive(Debug)]
pub struct JsonApiDocument(pub Value);

impl JsonApiDocument {
    /// Returns a reference to the inner Value.
    pub fn inner(&self) -> &Value {
        &self.0
    }

    /// Consumes the extractor and returns the inner Value.
    pub fn into_inner(self) -> Value {
        self.0
    }
}

/// Rejection raised when the body is not a JSON document.
#[derive(Debug)]
pub struct JsonApiDocumentRejection(String);

impl IntoResponse for JsonApiDocumentRejection {
    fn into_response(self) -> Response {
        RestError::BadRequest {
            message: format!("Invalid JSON: {}", self.0),
        }
        .into_response()
    }
}

impl<S> FromRequest<S> for JsonApiDocument
where
    S: Send + Sync,
{
    type Rejection = JsonApiDocumentRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| JsonApiDocumentRejection(e.to_string()))?;

        // An empty body validates like an empty document.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonApiDocument(Value::Object(Default::default())));
        }

        serde_json::from_slice(&bytes)
            .map(JsonApiDocument)
            .map_err(|e| JsonApiDocumentRejection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::json;

    async fn extract(body: &'static str) -> Result<JsonApiDocument, JsonApiDocumentRejection> {
        let request = Request::builder().body(Body::from(body)).unwrap();
        JsonApiDocument::from_request(request, &()).await
    }

    #[tokio::test]
    async fn test_parses_document() {
        let document = extract(r#"{"data": {"type": "shops"}}"#).await.unwrap();
        assert_eq!(document.inner()["data"]["type"], "shops");
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_document() {
        let document = extract("").await.unwrap();
        assert_eq!(document.into_inner(), json!({}));
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        assert!(extract("{data:").await.is_err());
    }
}
