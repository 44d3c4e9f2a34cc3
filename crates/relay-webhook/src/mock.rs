//! In-memory transport that records requests instead of sending them.

use std::collections::HashMap;
use std::sync::Mutex;

use jiff::Timestamp;

use crate::{Error, Result, WebhookRequest, WebhookResponse, WebhookTransport};

#[derive(Debug, Clone, Copy)]
enum Reply {
    Status(u16),
    ConnectionError,
    Timeout,
}

/// Recording [`WebhookTransport`] for tests.
///
/// Every url answers `200` unless configured otherwise.
#[derive(Debug)]
pub struct MockTransport {
    default_status: u16,
    replies: HashMap<String, Reply>,
    requests: Mutex<Vec<WebhookRequest>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a transport answering `200` for every url.
    pub fn new() -> Self {
        Self {
            default_status: 200,
            replies: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sets the status returned for urls without a specific reply.
    pub fn with_default_status(mut self, status: u16) -> Self {
        self.default_status = status;
        self
    }

    /// Answers `status` for requests to `url`.
    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.replies.insert(url.into(), Reply::Status(status));
        self
    }

    /// Fails requests to `url` with a connection error.
    pub fn with_connection_error(mut self, url: impl Into<String>) -> Self {
        self.replies.insert(url.into(), Reply::ConnectionError);
        self
    }

    /// Fails requests to `url` as if they exceeded their timeout.
    pub fn with_timeout(mut self, url: impl Into<String>) -> Self {
        self.replies.insert(url.into(), Reply::Timeout);
        self
    }

    /// Returns every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<WebhookRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .map(|requests| requests.len())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl WebhookTransport for MockTransport {
    async fn send(&self, request: WebhookRequest) -> Result<WebhookResponse> {
        let started_at = Timestamp::now();
        let reply = self
            .replies
            .get(request.url.as_str())
            .copied()
            .unwrap_or(Reply::Status(self.default_status));

        let request_id = request.request_id;
        let url = request.url.to_string();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        match reply {
            Reply::Status(status) => Ok(WebhookResponse::new(request_id, status, started_at)),
            Reply::ConnectionError => Err(Error::transport(format!(
                "Connection refused while sending to {url}"
            ))),
            Reply::Timeout => Err(Error::timeout(format!("Request to {url} timed out"))),
        }
    }
}
