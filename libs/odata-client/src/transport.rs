//! The seam between resource descriptors and the HTTP stack.
//!
//! The client never talks to the network itself; it hands an [`ODataRequest`]
//! to a [`Transport`] and interprets the [`ODataResponse`]. Applications plug
//! in their HTTP client of choice; tests plug in a recording fake.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::{Method, StatusCode};
use serde_json::Value;

use crate::error::TransportError;

/// Longest body excerpt kept in `TransportError::Status`.
pub const BODY_PREVIEW_LIMIT: usize = 512;

#[derive(Debug, Clone)]
pub struct ODataRequest {
    pub method: Method,
    /// Service root joined with the resource path, without query string
    pub path: String,
    pub params: BTreeMap<String, String>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub etag: Option<String>,
}

impl ODataRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: BTreeMap::new(),
            headers: HeaderMap::new(),
            body: None,
            etag: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    /// Path followed by the query string in protocol order.
    #[must_use]
    pub fn url(&self) -> String {
        odata_core::serialize::path_with_query(&self.path, &self.params)
    }
}

#[derive(Debug, Clone)]
pub struct ODataResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ODataResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// A JSON response with the matching content type.
    #[must_use]
    pub fn json(status: StatusCode, body: &Value) -> Self {
        let mut response = Self::new(status, body.to_string());
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    #[must_use]
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT, Bytes::new())
    }

    #[must_use]
    pub fn with_header(mut self, name: http::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Parsed JSON body; `None` for an empty body.
    ///
    /// # Errors
    /// Returns `serde_json::Error` when the body is not valid JSON.
    pub fn json_body(&self) -> Result<Option<Value>, serde_json::Error> {
        if self.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&self.body).map(Some)
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn body_preview(&self) -> String {
        let text = self.text();
        match text.char_indices().nth(BODY_PREVIEW_LIMIT) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text,
        }
    }
}

/// Executes requests on behalf of the client.
///
/// Implementations return every HTTP answer as an `ODataResponse`, whatever
/// its status; only network-level failures should surface as
/// `TransportError::Failed`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ODataRequest) -> Result<ODataResponse, TransportError>;
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_and_whitespace_bodies_have_no_json() {
        assert_eq!(ODataResponse::no_content().json_body().unwrap(), None);
        let blank = ODataResponse::new(StatusCode::OK, " \n");
        assert_eq!(blank.json_body().unwrap(), None);
    }

    #[test]
    fn json_body_parses() {
        let response = ODataResponse::json(StatusCode::OK, &json!({"Id": 1}));
        assert_eq!(response.json_body().unwrap(), Some(json!({"Id": 1})));
        assert_eq!(response.headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn body_preview_is_truncated() {
        let response = ODataResponse::new(StatusCode::BAD_REQUEST, "x".repeat(BODY_PREVIEW_LIMIT + 10));
        let preview = response.body_preview();
        assert_eq!(preview.len(), BODY_PREVIEW_LIMIT + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn url_renders_query_in_protocol_order() {
        let request = ODataRequest::new(Method::GET, "People").with_params(BTreeMap::from([
            ("$top".to_owned(), "2".to_owned()),
            ("$select".to_owned(), "Name".to_owned()),
        ]));
        assert_eq!(request.url(), "People?$select=Name&$top=2");
    }
}
