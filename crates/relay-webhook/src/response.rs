//! Webhook delivery response types.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response received from a webhook endpoint.
///
/// Any status code counts as a completed delivery; callers that care about
/// the remote verdict inspect [`WebhookResponse::is_success`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// Request ID this response corresponds to.
    pub request_id: Uuid,
    /// HTTP status code returned by the endpoint.
    pub status_code: u16,
    /// Timestamp when the request was initiated.
    pub started_at: Timestamp,
    /// Timestamp when the response was received.
    pub finished_at: Timestamp,
}

impl WebhookResponse {
    /// Creates a response finished now.
    pub fn new(request_id: Uuid, status_code: u16, started_at: Timestamp) -> Self {
        Self {
            request_id,
            status_code,
            started_at,
            finished_at: Timestamp::now(),
        }
    }

    /// Returns whether the endpoint answered with a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Round-trip time of the exchange.
    pub fn duration(&self) -> jiff::Span {
        self.started_at.until(self.finished_at).unwrap_or_default()
    }
}
