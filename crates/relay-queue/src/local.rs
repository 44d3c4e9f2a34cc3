//! In-process queue runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::{
    Error, ForwardJob, JobHandler, JobQueue, Result, TRACING_TARGET_QUEUE, TRACING_TARGET_WORKER,
};

/// Default number of jobs executed at once per queue.
const DEFAULT_CONCURRENCY: usize = 4;

/// Settings for [`LocalQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalQueueConfig {
    /// Maximum jobs in flight per named queue.
    pub concurrency: usize,
}

impl Default for LocalQueueConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl LocalQueueConfig {
    /// Set the per-queue concurrency; zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Tokio-backed queue runtime with named queues.
///
/// Each queue gets its own worker on first submit. A failed attempt is
/// rescheduled after the job's backoff delay without blocking other jobs;
/// once attempts run out the handler's `failed` hook runs exactly once.
/// Cloning is cheap; clones share the same queues.
#[derive(Clone)]
pub struct LocalQueue {
    inner: Arc<LocalQueueInner>,
}

struct LocalQueueInner {
    handler: Arc<dyn JobHandler>,
    config: LocalQueueConfig,
    senders: Mutex<HashMap<String, mpsc::UnboundedSender<ForwardJob>>>,
    discarded: Mutex<Vec<ForwardJob>>,
    cancel_token: CancellationToken,
    tracker: TaskTracker,
}

impl std::fmt::Debug for LocalQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalQueue")
            .field("config", &self.inner.config)
            .field("cancelled", &self.inner.cancel_token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl LocalQueue {
    /// Creates the runtime; workers start lazily.
    pub fn new(handler: Arc<dyn JobHandler>, config: LocalQueueConfig) -> Self {
        Self::with_cancel_token(handler, config, CancellationToken::new())
    }

    /// Creates the runtime bound to an external shutdown token.
    pub fn with_cancel_token(
        handler: Arc<dyn JobHandler>,
        config: LocalQueueConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        let inner = LocalQueueInner {
            handler,
            config,
            senders: Mutex::new(HashMap::new()),
            discarded: Mutex::new(Vec::new()),
            cancel_token,
            tracker: TaskTracker::new(),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Stops accepting jobs, cancels pending retries and waits for
    /// in-flight attempts to finish.
    ///
    /// Returns the accepted jobs that were dropped without completing: jobs
    /// still waiting in a queue and jobs waiting for a retry.
    pub async fn shutdown(&self) -> Vec<ForwardJob> {
        tracing::info!(target: TRACING_TARGET_WORKER, "Shutting down local queue");

        self.inner.cancel_token.cancel();
        if let Ok(mut senders) = self.inner.senders.lock() {
            senders.clear();
        }

        self.inner.tracker.close();
        self.inner.tracker.wait().await;

        let discarded = match self.inner.discarded.lock() {
            Ok(mut discarded) => std::mem::take(&mut *discarded),
            Err(_) => Vec::new(),
        };

        if !discarded.is_empty() {
            tracing::warn!(
                target: TRACING_TARGET_WORKER,
                discarded = discarded.len(),
                "Local queue stopped with unfinished jobs"
            );
        }

        discarded
    }

    fn sender(&self, queue: &str) -> Result<mpsc::UnboundedSender<ForwardJob>> {
        let mut senders = self
            .inner
            .senders
            .lock()
            .map_err(|_| Error::operation("queue_lock", "queue registry lock poisoned"))?;

        if let Some(sender) = senders.get(queue) {
            return Ok(sender.clone());
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        senders.insert(queue.to_owned(), sender.clone());

        tracing::debug!(
            target: TRACING_TARGET_QUEUE,
            queue,
            concurrency = self.inner.config.concurrency.max(1),
            "Starting queue worker"
        );

        let worker = Worker {
            queue: queue.to_owned(),
            inner: self.inner.clone(),
            sender: sender.downgrade(),
            semaphore: Arc::new(Semaphore::new(self.inner.config.concurrency.max(1))),
        };
        self.inner.tracker.spawn(worker.run(receiver));

        Ok(sender)
    }
}

#[async_trait::async_trait]
impl JobQueue for LocalQueue {
    async fn submit(&self, job: ForwardJob) -> Result<()> {
        if self.inner.cancel_token.is_cancelled() {
            return Err(Error::queue_closed(&job.queue));
        }

        let queue = job.queue.clone();
        self.sender(&queue)?
            .send(job)
            .map_err(|_| Error::queue_closed(&queue))
    }
}

impl LocalQueueInner {
    /// Records an accepted job dropped by shutdown.
    fn discard(&self, job: ForwardJob, message: &'static str) {
        tracing::warn!(
            target: TRACING_TARGET_WORKER,
            job_id = %job.id,
            url = %job.url,
            group_name = job.group_name.as_deref(),
            queue = %job.queue,
            attempts = job.attempts,
            "{message}"
        );

        if let Ok(mut discarded) = self.discarded.lock() {
            discarded.push(job);
        }
    }
}

struct Worker {
    queue: String,
    inner: Arc<LocalQueueInner>,
    sender: mpsc::WeakUnboundedSender<ForwardJob>,
    semaphore: Arc<Semaphore>,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<ForwardJob>) {
        loop {
            tokio::select! {
                biased;

                () = self.inner.cancel_token.cancelled() => {
                    tracing::debug!(
                        target: TRACING_TARGET_WORKER,
                        queue = %self.queue,
                        "Shutdown requested, stopping queue worker"
                    );
                    break;
                }

                job = receiver.recv() => {
                    let Some(job) = job else { break };

                    let permit = tokio::select! {
                        biased;

                        () = self.inner.cancel_token.cancelled() => None,
                        permit = self.semaphore.clone().acquire_owned() => permit.ok(),
                    };
                    let Some(permit) = permit else {
                        self.inner.discard(job, "Queued job dropped by shutdown");
                        break;
                    };

                    let inner = self.inner.clone();
                    let sender = self.sender.clone();
                    self.inner.tracker.spawn(async move {
                        let _permit = permit;
                        run_attempt(inner, sender, job).await;
                    });
                }
            }
        }

        receiver.close();
        while let Ok(job) = receiver.try_recv() {
            self.inner.discard(job, "Queued job dropped by shutdown");
        }
    }
}

async fn run_attempt(
    inner: Arc<LocalQueueInner>,
    sender: mpsc::WeakUnboundedSender<ForwardJob>,
    mut job: ForwardJob,
) {
    job.record_attempt();

    tracing::debug!(
        target: TRACING_TARGET_WORKER,
        job_id = %job.id,
        queue = %job.queue,
        attempt = job.attempts,
        max_attempts = job.max_attempts,
        "Processing forward job"
    );

    let error = match inner.handler.handle(&job).await {
        Ok(()) => {
            tracing::debug!(
                target: TRACING_TARGET_WORKER,
                job_id = %job.id,
                attempt = job.attempts,
                "Forward job completed"
            );
            return;
        }
        Err(error) => error,
    };

    if !job.can_retry() {
        inner.handler.failed(&job, Some(&error)).await;
        return;
    }

    let delay = job.next_delay();
    tracing::warn!(
        target: TRACING_TARGET_WORKER,
        job_id = %job.id,
        attempt = job.attempts,
        max_attempts = job.max_attempts,
        delay_secs = delay.as_secs(),
        error = %error,
        "Forward job failed, will retry"
    );

    let cancel_token = inner.cancel_token.clone();
    let tracker = inner.tracker.clone();
    tracker.spawn(async move {
        tokio::select! {
            () = cancel_token.cancelled() => {
                inner.discard(job, "Retry cancelled by shutdown");
            }
            () = tokio::time::sleep(delay) => {
                let rejected = match sender.upgrade() {
                    Some(sender) => sender.send(job).err().map(|error| error.0),
                    None => Some(job),
                };
                if let Some(job) = rejected {
                    inner.discard(job, "Queue closed before retry");
                }
            }
        }
    });
}
