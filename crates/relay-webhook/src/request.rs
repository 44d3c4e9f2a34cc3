//! Outbound webhook request.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::HttpMethod;

/// A single outbound HTTP call produced by a delivery strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookRequest {
    /// Unique identifier for this request.
    pub request_id: Uuid,
    /// HTTP method to use.
    pub method: HttpMethod,
    /// The webhook endpoint URL.
    pub url: Url,
    /// Static headers to include in the request.
    pub headers: BTreeMap<String, String>,
    /// JSON body, omitted when `None`.
    pub body: Option<Value>,
    /// Upper bound for the whole exchange.
    pub timeout: Duration,
}

impl WebhookRequest {
    /// Creates a request without headers or body.
    pub fn new(method: HttpMethod, url: Url, timeout: Duration) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            method,
            url,
            headers: BTreeMap::new(),
            body: None,
            timeout,
        }
    }

    /// Adds a header to the request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Merges multiple headers into the request.
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets the JSON body.
    pub fn with_json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the header value for `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
