//! JSON:API media type negotiation.
//!
//! - A request with a body must declare `Content-Type: application/vnd.api+json`
//!   without media type parameters, otherwise `415 Unsupported Media Type`.
//! - An `Accept` header that lists the JSON:API media type only with
//!   parameters is answered with `406 Not Acceptable`. A missing `Accept`
//!   header, or one without the JSON:API media type, is allowed.

use axum::{
    extract::Request,
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::RestError;
use crate::responses::JSON_API_MEDIA_TYPE;

/// A media range split into its type and whether it carried parameters.
fn split_media_type(value: &str) -> (String, bool) {
    let mut parts = value.split(';');
    let media_type = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    let has_params = parts.any(|p| !p.trim().is_empty());
    (media_type, has_params)
}

/// Checks the `Content-Type` of a request that carries a body.
pub fn check_content_type(headers: &HeaderMap) -> Result<(), RestError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match split_media_type(content_type) {
        (media_type, false) if media_type == JSON_API_MEDIA_TYPE => Ok(()),
        _ => Err(RestError::UnsupportedMediaType {
            content_type: content_type.to_string(),
        }),
    }
}

/// Checks that the client accepts the unparameterized JSON:API media type.
pub fn check_accept(headers: &HeaderMap) -> Result<(), RestError> {
    let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };

    let json_api: Vec<bool> = accept
        .split(',')
        .map(split_media_type)
        .filter(|(media_type, _)| media_type == JSON_API_MEDIA_TYPE)
        .map(|(_, has_params)| has_params)
        .collect();

    if !json_api.is_empty() && json_api.iter().all(|has_params| *has_params) {
        return Err(RestError::NotAcceptable {
            message: format!(
                "The '{}' media type must be accepted without parameters",
                JSON_API_MEDIA_TYPE
            ),
        });
    }
    Ok(())
}

fn has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PATCH | Method::PUT)
}

/// Middleware enforcing JSON:API media type rules.
pub async fn enforce_media_type(request: Request, next: Next) -> Response {
    let checked = check_accept(request.headers()).and_then(|()| {
        if has_body(request.method()) {
            check_content_type(request.headers())
        } else {
            Ok(())
        }
    });

    match checked {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: header::HeaderName, value: &'static str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_static(value));
        map
    }

    #[test]
    fn test_content_type_exact_match() {
        assert!(check_content_type(&headers(header::CONTENT_TYPE, "application/vnd.api+json")).is_ok());
        assert!(check_content_type(&headers(header::CONTENT_TYPE, "Application/Vnd.Api+Json")).is_ok());
    }

    #[test]
    fn test_content_type_rejections() {
        for value in [
            "application/json",
            "application/vnd.api+json; charset=utf-8",
            "text/plain",
        ] {
            let err = check_content_type(&headers(header::CONTENT_TYPE, value)).unwrap_err();
            assert!(matches!(err, RestError::UnsupportedMediaType { .. }));
        }
        assert!(check_content_type(&HeaderMap::new()).is_err());
    }

    #[test]
    fn test_accept() {
        assert!(check_accept(&HeaderMap::new()).is_ok());
        assert!(check_accept(&headers(header::ACCEPT, "*/*")).is_ok());
        assert!(check_accept(&headers(header::ACCEPT, "application/vnd.api+json")).is_ok());
        assert!(
            check_accept(&headers(
                header::ACCEPT,
                "application/vnd.api+json; ext=bulk, application/vnd.api+json"
            ))
            .is_ok()
        );

        let err = check_accept(&headers(header::ACCEPT, "application/vnd.api+json; ext=bulk"))
            .unwrap_err();
        assert!(matches!(err, RestError::NotAcceptable { .. }));
    }
}
