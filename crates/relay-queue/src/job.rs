//! Forward job definition.

use std::time::Duration;

use jiff::Timestamp;
use relay_webhook::Payload;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Backoff, DEFAULT_QUEUE, RetryPolicy};

/// One inbound payload waiting to be dispatched to its webhook group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardJob {
    pub id: Uuid,
    /// Url of the inbound request.
    pub url: String,
    pub payload: Payload,
    /// Target group, `None` for the default group.
    pub group_name: Option<String>,
    /// Queue the job was submitted to.
    pub queue: String,
    /// Attempts started so far.
    pub attempts: u32,
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub created_at: Timestamp,
}

impl ForwardJob {
    /// Create a new job with the given retry policy
    pub fn new(
        url: impl Into<String>,
        payload: Payload,
        group_name: Option<String>,
        policy: &RetryPolicy,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            url: url.into(),
            payload,
            group_name,
            queue: DEFAULT_QUEUE.to_owned(),
            attempts: 0,
            max_attempts: policy.max_attempts.max(1),
            backoff: policy.backoff.clone(),
            created_at: Timestamp::now(),
        }
    }

    /// Set the destination queue
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Group name as passed to the dispatcher
    pub fn group(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    /// Marks the start of a new attempt
    pub fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Check if another attempt is allowed after the current one
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Delay before the next attempt
    pub fn next_delay(&self) -> Duration {
        self.backoff.delay_for(self.attempts)
    }

    /// Get job age
    pub fn age(&self) -> Duration {
        let signed = Timestamp::now().duration_since(self.created_at);
        Duration::try_from(signed).unwrap_or_default()
    }
}
