//! Job submission.

use std::sync::Arc;

use relay_webhook::Payload;
use uuid::Uuid;

use crate::{ForwardJob, Result, RetryPolicy, TRACING_TARGET_QUEUE};

/// Queue used when no name, or a blank one, is configured.
pub const DEFAULT_QUEUE: &str = "default";

/// Returns `name` trimmed, or [`DEFAULT_QUEUE`] when absent or blank.
pub fn queue_or_default(name: Option<&str>) -> &str {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => DEFAULT_QUEUE,
    }
}

/// Destination for forward jobs.
///
/// Implementations own scheduling and retry timing; submitting never runs
/// the job inline.
#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    /// Submits a job to the queue named by `job.queue`.
    async fn submit(&self, job: ForwardJob) -> Result<()>;
}

/// Builds forward jobs and submits them to a [`JobQueue`].
#[derive(Clone)]
pub struct Forwarder {
    queue: Arc<dyn JobQueue>,
    policy: RetryPolicy,
    queue_name: Option<String>,
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("policy", &self.policy)
            .field("queue_name", &self.queue_name)
            .finish_non_exhaustive()
    }
}

impl Forwarder {
    /// Creates a forwarder submitting to `queue` with the given policy.
    pub fn new(queue: Arc<dyn JobQueue>, policy: RetryPolicy) -> Self {
        Self {
            queue,
            policy,
            queue_name: None,
        }
    }

    /// Sets the queue used when `enqueue` is given none.
    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }

    /// Returns the retry policy applied to new jobs.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the queue used when `enqueue` is given none.
    pub fn queue_name(&self) -> &str {
        queue_or_default(self.queue_name.as_deref())
    }

    /// Enqueues `payload` for asynchronous delivery to `group_name`.
    ///
    /// `queue_name` overrides the configured queue; a blank result selects
    /// the default queue. Returns the id of the submitted job.
    #[tracing::instrument(target = TRACING_TARGET_QUEUE, skip(self, payload))]
    pub async fn enqueue(
        &self,
        url: &str,
        payload: Payload,
        group_name: Option<&str>,
        queue_name: Option<&str>,
    ) -> Result<Uuid> {
        let queue = queue_or_default(queue_name.or(self.queue_name.as_deref()));
        let job = ForwardJob::new(url, payload, group_name.map(str::to_owned), &self.policy)
            .with_queue(queue);
        let job_id = job.id;

        self.queue.submit(job).await?;

        tracing::debug!(
            target: TRACING_TARGET_QUEUE,
            job_id = %job_id,
            queue,
            "Forward job enqueued"
        );

        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::Backoff;

    #[derive(Default)]
    struct RecordingQueue {
        jobs: Mutex<Vec<ForwardJob>>,
    }

    #[async_trait::async_trait]
    impl JobQueue for RecordingQueue {
        async fn submit(&self, job: ForwardJob) -> Result<()> {
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }

    #[test]
    fn test_queue_or_default() {
        assert_eq!(queue_or_default(None), "default");
        assert_eq!(queue_or_default(Some("")), "default");
        assert_eq!(queue_or_default(Some("  ")), "default");
        assert_eq!(queue_or_default(Some(" webhooks ")), "webhooks");
    }

    #[tokio::test]
    async fn test_enqueue_builds_job() {
        let queue = Arc::new(RecordingQueue::default());
        let policy = RetryPolicy::new(5, Backoff::Schedule(vec![10, 20, 30]));
        let forwarder = Forwarder::new(queue.clone(), policy);

        let mut payload = Payload::new();
        payload.insert("key".into(), "value".into());
        let id = forwarder
            .enqueue("https://source.test", payload, Some("default"), None)
            .await
            .unwrap();

        let jobs = queue.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
        assert_eq!(jobs[0].url, "https://source.test");
        assert_eq!(jobs[0].group(), Some("default"));
        assert_eq!(jobs[0].queue, "default");
        assert_eq!(jobs[0].max_attempts, 5);
        assert_eq!(jobs[0].backoff, Backoff::Schedule(vec![10, 20, 30]));
    }

    #[tokio::test]
    async fn test_queue_name_precedence() {
        let queue = Arc::new(RecordingQueue::default());
        let forwarder =
            Forwarder::new(queue.clone(), RetryPolicy::default()).with_queue_name("configured");
        assert_eq!(forwarder.queue_name(), "configured");

        forwarder
            .enqueue("https://a.test", Payload::new(), None, None)
            .await
            .unwrap();
        forwarder
            .enqueue("https://a.test", Payload::new(), None, Some("explicit"))
            .await
            .unwrap();
        forwarder
            .enqueue("https://a.test", Payload::new(), None, Some(" "))
            .await
            .unwrap();

        let queues: Vec<_> = queue
            .jobs
            .lock()
            .unwrap()
            .iter()
            .map(|job| job.queue.clone())
            .collect();
        assert_eq!(queues, vec!["configured", "explicit", "default"]);
    }
}
