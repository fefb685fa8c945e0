//! Query string extractor.
//!
//! JSON:API parameters use bracketed names (`filter[name]`, `page[size]`)
//! and may repeat, so the raw query string is decoded into ordered pairs
//! rather than a map.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

/// Axum extractor for the decoded query string, in request order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams(pub Vec<(String, String)>);

impl QueryParams {
    /// Decodes a raw query string.
    pub fn parse(query: &str) -> Self {
        Self(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    /// Returns the pairs.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.uri.query().map(Self::parse).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracketed_names_decoded() {
        let params = QueryParams::parse("filter%5Bname%5D=Corner%20Store&page[size]=5&sort=-name");
        assert_eq!(
            params.pairs(),
            [
                ("filter[name]".to_string(), "Corner Store".to_string()),
                ("page[size]".to_string(), "5".to_string()),
                ("sort".to_string(), "-name".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_query() {
        assert!(QueryParams::parse("").pairs().is_empty());
    }
}
