//! Chat-message delivery for Discord-compatible webhooks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::DeliveryStrategy;
use crate::{
    Error, HttpMethod, Payload, Result, TRACING_TARGET, TargetConfig, WebhookRequest,
    WebhookResponse, WebhookTransport,
};

/// Posts `{"content": "<source_url>\n<payload as JSON>"}`.
///
/// Chat webhook endpoints only accept POST, so the target's configured
/// method and headers are ignored.
pub struct DiscordStrategy {
    transport: Arc<dyn WebhookTransport>,
    default_timeout: Duration,
}

impl fmt::Debug for DiscordStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordStrategy")
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl DiscordStrategy {
    /// Creates the strategy on top of `transport`.
    pub fn new(transport: Arc<dyn WebhookTransport>, default_timeout: Duration) -> Self {
        Self {
            transport,
            default_timeout,
        }
    }

    /// Renders the message content: source url, a line break, then the payload.
    pub fn format_content(source_url: &str, payload: &Payload) -> Result<String> {
        let encoded = serde_json::to_string(payload).map_err(Error::PayloadEncoding)?;
        Ok(format!("{source_url}\n{encoded}"))
    }

    /// Validates `target` and builds the outbound request.
    pub fn build_request(
        &self,
        source_url: &str,
        payload: &Payload,
        target: &TargetConfig,
    ) -> Result<WebhookRequest> {
        let url = target.resolve_url()?;
        let timeout = target.resolve_timeout(self.default_timeout)?;
        let content = Self::format_content(source_url, payload)?;

        Ok(WebhookRequest::new(HttpMethod::Post, url, timeout)
            .with_json_body(json!({ "content": content })))
    }
}

#[async_trait::async_trait]
impl DeliveryStrategy for DiscordStrategy {
    async fn send(
        &self,
        source_url: &str,
        payload: &Payload,
        target: &TargetConfig,
    ) -> Result<WebhookResponse> {
        let request = self.build_request(source_url, payload, target)?;

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            source_url,
            url = %request.url,
            "Sending discord webhook"
        );

        self.transport.send(request).await
    }
}
