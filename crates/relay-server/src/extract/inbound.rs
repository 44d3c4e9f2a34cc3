//! Capture of inbound requests as forwardable payloads.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use relay_webhook::Payload;
use serde_json::Value;
use url::form_urlencoded;

use crate::handler::{Error, ErrorKind, Result};

/// Payload key holding the captured query parameters.
pub const QUERY_KEY: &str = "_query";

/// Header carrying the original scheme behind a proxy.
const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Inbound request reduced to what is forwarded: its url and payload.
///
/// The payload is the JSON object (or form) body with query parameters
/// merged in; body fields win on conflicts. A non-empty query is also kept
/// as an object under `_query`.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    /// Scheme, host and path of the request, without the query.
    pub url: String,
    pub payload: Payload,
}

impl InboundRequest {
    /// Captures a request from its head and buffered body.
    pub fn capture(parts: &Parts, body: &[u8]) -> Result<Self> {
        let mut payload = body_payload(&parts.headers, body)?;

        let query: Payload = parts
            .uri
            .query()
            .map(|query| {
                form_urlencoded::parse(query.as_bytes())
                    .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
                    .collect()
            })
            .unwrap_or_default();

        if !query.is_empty() {
            for (key, value) in &query {
                payload
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
            payload.insert(QUERY_KEY.to_owned(), Value::Object(query));
        }

        Ok(Self {
            url: source_url(parts),
            payload,
        })
    }
}

impl<S> FromRequest<S> for InboundRequest
where
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(request: Request, state: &S) -> Result<Self> {
        let (parts, body) = request.into_parts();
        let body = read_body(Request::from_parts(parts.clone(), body), state).await?;
        Self::capture(&parts, &body)
    }
}

/// Buffers the body, honoring the router's body limit.
pub(crate) async fn read_body<S>(request: Request, state: &S) -> Result<Bytes>
where
    S: Send + Sync,
{
    Bytes::from_request(request, state).await.map_err(|rejection| {
        let kind = if rejection.status() == ErrorKind::PayloadTooLarge.status_code() {
            ErrorKind::PayloadTooLarge
        } else {
            ErrorKind::BadRequest
        };
        kind.with_context(rejection.body_text())
    })
}

fn body_payload(headers: &HeaderMap, body: &[u8]) -> Result<Payload> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::new());
    }

    if is_form(headers) {
        let form = form_urlencoded::parse(body)
            .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
            .collect();
        return Ok(form);
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(payload)) => Ok(payload),
        Ok(_) => Err(ErrorKind::BadRequest.with_message("Request body must be a JSON object")),
        Err(e) => Err(ErrorKind::BadRequest
            .with_message("Request body is not valid JSON")
            .with_context(e.to_string())),
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

fn source_url(parts: &Parts) -> String {
    let path = parts.uri.path();
    let host = parts
        .uri
        .authority()
        .map(|authority| authority.as_str())
        .or_else(|| {
            parts
                .headers
                .get(header::HOST)
                .and_then(|value| value.to_str().ok())
        });

    let Some(host) = host else {
        return path.to_owned();
    };

    let scheme = parts
        .headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .or_else(|| parts.uri.scheme_str())
        .unwrap_or("http");

    format!("{scheme}://{host}{path}")
}
