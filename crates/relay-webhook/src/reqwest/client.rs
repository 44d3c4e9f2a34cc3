//! Reqwest-based HTTP client for webhook delivery.

use std::sync::Arc;

use jiff::Timestamp;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};

use super::{Error, ReqwestConfig, TRACING_TARGET};
use crate::{HttpMethod, WebhookRequest, WebhookResponse, WebhookTransport};

/// Inner client that holds the HTTP client and configuration.
struct ReqwestClientInner {
    http: Client,
    config: ReqwestConfig,
}

/// Reqwest-based HTTP client for delivering webhook payloads to external endpoints.
///
/// Implements [`WebhookTransport`]: one request per call, no retries,
/// every received status code is returned as a [`WebhookResponse`].
///
/// # Examples
///
/// ```rust,ignore
/// use relay_webhook::reqwest::{ReqwestClient, ReqwestConfig};
///
/// let client = ReqwestClient::new(ReqwestConfig::default())?;
/// let response = client.send(request).await?;
/// ```
#[derive(Clone)]
pub struct ReqwestClient {
    inner: Arc<ReqwestClientInner>,
}

impl std::fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestClient {
    /// Creates a new reqwest client with the given configuration.
    pub fn new(config: ReqwestConfig) -> crate::Result<Self> {
        let connect_timeout = config.effective_connect_timeout();
        let user_agent = config.effective_user_agent();

        tracing::debug!(
            target: TRACING_TARGET,
            connect_timeout_ms = connect_timeout.as_millis(),
            user_agent = %user_agent,
            "Creating reqwest client"
        );

        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(&user_agent)
            .build()
            .map_err(|e| crate::Error::transport("Failed to create HTTP client").with_source(e))?;

        let inner = ReqwestClientInner { http, config };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the underlying HTTP client.
    pub(crate) fn http(&self) -> &Client {
        &self.inner.http
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ReqwestConfig {
        &self.inner.config
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
    }
}

#[async_trait::async_trait]
impl WebhookTransport for ReqwestClient {
    async fn send(&self, request: WebhookRequest) -> crate::Result<WebhookResponse> {
        let started_at = Timestamp::now();

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            method = %request.method,
            url = %request.url,
            timeout_ms = request.timeout.as_millis(),
            "Delivering webhook"
        );

        let mut http_request = self
            .http()
            .request(to_method(request.method), request.url.as_str())
            .timeout(request.timeout);

        if let Some(body) = &request.body {
            let body = serde_json::to_vec(body).map_err(Error::Serde)?;
            http_request = http_request.body(body);

            // A content type set by the target replaces the JSON default.
            if request.header(CONTENT_TYPE.as_str()).is_none() {
                http_request = http_request.header(CONTENT_TYPE, "application/json");
            }
        }

        for (name, value) in &request.headers {
            http_request = http_request.header(name, value);
        }

        let http_response = http_request.send().await.map_err(Error::from)?;

        let status_code = http_response.status().as_u16();
        let response = WebhookResponse::new(request.request_id, status_code, started_at);

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            status_code,
            success = response.is_success(),
            "Webhook delivery completed"
        );

        Ok(response)
    }
}
