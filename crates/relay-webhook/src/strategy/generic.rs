//! Generic JSON delivery.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::DeliveryStrategy;
use crate::{
    Payload, Result, TRACING_TARGET, TargetConfig, WebhookRequest, WebhookResponse,
    WebhookTransport,
};

/// Forwards the payload as a JSON body using the target's own method,
/// headers and timeout.
///
/// An empty payload is sent without a body.
pub struct GenericStrategy {
    transport: Arc<dyn WebhookTransport>,
    default_timeout: Duration,
}

impl fmt::Debug for GenericStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericStrategy")
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl GenericStrategy {
    /// Creates the strategy on top of `transport`.
    pub fn new(transport: Arc<dyn WebhookTransport>, default_timeout: Duration) -> Self {
        Self {
            transport,
            default_timeout,
        }
    }

    /// Validates `target` and builds the outbound request.
    ///
    /// Checks run in order: url, method, timeout, headers. The first
    /// violation is returned as [`crate::Error::InvalidTarget`].
    pub fn build_request(&self, payload: &Payload, target: &TargetConfig) -> Result<WebhookRequest> {
        let url = target.resolve_url()?;
        let method = target.resolve_method()?;
        let timeout = target.resolve_timeout(self.default_timeout)?;
        let headers = target.resolve_headers()?;

        let mut request = WebhookRequest::new(method, url, timeout).with_headers(headers);
        if !payload.is_empty() {
            request = request.with_json_body(Value::Object(payload.clone()));
        }

        Ok(request)
    }
}

#[async_trait::async_trait]
impl DeliveryStrategy for GenericStrategy {
    async fn send(
        &self,
        source_url: &str,
        payload: &Payload,
        target: &TargetConfig,
    ) -> Result<WebhookResponse> {
        let request = self.build_request(payload, target)?;

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            source_url,
            url = %request.url,
            method = %request.method,
            has_body = request.body.is_some(),
            "Sending generic webhook"
        );

        self.transport.send(request).await
    }
}
