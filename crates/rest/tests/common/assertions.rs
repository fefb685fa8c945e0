//! JSON:API response assertions.

use axum::http::header;
use axum_test::TestResponse;
use serde_json::Value;

use super::harness::JSON_API;

/// Asserts that the response is labeled with the JSON:API media type.
pub fn assert_json_api(response: &TestResponse) {
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert_eq!(content_type, JSON_API, "Expected JSON:API content type");
}

/// Asserts that the body is an error document and returns its error objects.
pub fn error_objects(body: &Value) -> &Vec<Value> {
    assert!(body.get("data").is_none(), "Error document must not carry data");
    let errors = body["errors"]
        .as_array()
        .unwrap_or_else(|| panic!("Expected an error document, got {}", body));
    assert!(!errors.is_empty(), "Expected at least one error object");
    errors
}

/// Returns the `source.pointer` of every error object.
#[allow(dead_code)]
pub fn error_pointers(body: &Value) -> Vec<String> {
    error_objects(body)
        .iter()
        .filter_map(|e| e["source"]["pointer"].as_str().map(str::to_string))
        .collect()
}
