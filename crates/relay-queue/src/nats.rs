//! JetStream-backed queue runtime.
//!
//! All queues share one work-queue stream; each named queue is a subject
//! (`relay.jobs.<queue>`) with its own durable pull consumer. Failed attempts
//! are negatively acknowledged with the job's backoff delay so JetStream
//! redelivers them; the delivery count is the attempt number.

use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::{self, AckKind, consumer, stream};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{
    Error, ForwardJob, JobHandler, JobQueue, Result, TRACING_TARGET_QUEUE, TRACING_TARGET_WORKER,
};

/// Name of the stream holding every forward job.
pub const STREAM_NAME: &str = "RELAY_JOBS";

/// Subject prefix of forward jobs.
const SUBJECT_PREFIX: &str = "relay.jobs";

/// Time a worker may hold a job before JetStream redelivers it.
const ACK_WAIT: Duration = Duration::from_secs(300);

/// Queue runtime storing forward jobs in NATS JetStream.
#[derive(Clone)]
pub struct NatsQueue {
    jetstream: jetstream::Context,
    stream_name: String,
}

impl std::fmt::Debug for NatsQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsQueue")
            .field("stream_name", &self.stream_name)
            .finish_non_exhaustive()
    }
}

impl NatsQueue {
    /// Connects to the job stream, creating it when missing.
    #[tracing::instrument(skip(jetstream), target = TRACING_TARGET_QUEUE)]
    pub async fn new(jetstream: &jetstream::Context) -> Result<Self> {
        let stream_config = stream::Config {
            name: STREAM_NAME.to_owned(),
            description: Some("Relay forward jobs".to_owned()),
            subjects: vec![format!("{SUBJECT_PREFIX}.>")],
            retention: stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };

        match jetstream.get_stream(STREAM_NAME).await {
            Ok(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_QUEUE,
                    stream = STREAM_NAME,
                    "Using existing job stream"
                );
            }
            Err(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_QUEUE,
                    stream = STREAM_NAME,
                    "Creating new job stream"
                );
                jetstream
                    .create_stream(stream_config)
                    .await
                    .map_err(|e| Error::operation("stream_create", e.to_string()))?;
            }
        }

        Ok(Self {
            jetstream: jetstream.clone(),
            stream_name: STREAM_NAME.to_owned(),
        })
    }

    /// Runs a worker for `queue` until `cancel_token` fires.
    ///
    /// Jobs are processed one at a time; start several workers for more
    /// throughput, they share the durable consumer.
    #[tracing::instrument(skip(self, handler, cancel_token), target = TRACING_TARGET_WORKER)]
    pub async fn run_worker(
        &self,
        queue: &str,
        handler: Arc<dyn JobHandler>,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        let consumer = self.create_consumer(queue).await?;
        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| Error::operation("consumer_messages", e.to_string()))?;

        tracing::info!(target: TRACING_TARGET_WORKER, queue, "Queue worker started");

        loop {
            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(
                        target: TRACING_TARGET_WORKER,
                        queue,
                        "Shutdown requested, stopping queue worker"
                    );
                    break;
                }

                message = messages.next() => {
                    match message {
                        Some(Ok(message)) => process_message(handler.as_ref(), message).await,
                        Some(Err(e)) => {
                            tracing::error!(
                                target: TRACING_TARGET_WORKER,
                                queue,
                                error = %e,
                                "Failed to receive job"
                            );
                        }
                        None => break,
                    }
                }
            }
        }

        Ok(())
    }

    async fn create_consumer(&self, queue: &str) -> Result<consumer::PullConsumer> {
        let consumer_name = format!("relay_worker_{}", subject_token(queue));

        let consumer_config = consumer::pull::Config {
            name: Some(consumer_name.clone()),
            durable_name: Some(consumer_name.clone()),
            description: Some(format!("Relay worker for queue {queue}")),
            filter_subject: subject(queue),
            ack_wait: ACK_WAIT,
            ..Default::default()
        };

        let stream = self
            .jetstream
            .get_stream(&self.stream_name)
            .await
            .map_err(|e| Error::operation("stream_get", e.to_string()))?;

        let consumer = stream
            .get_or_create_consumer(&consumer_name, consumer_config)
            .await
            .map_err(|e| Error::operation("consumer_create", e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET_WORKER,
            consumer = %consumer_name,
            queue,
            "Created worker consumer"
        );

        Ok(consumer)
    }
}

#[async_trait::async_trait]
impl JobQueue for NatsQueue {
    async fn submit(&self, job: ForwardJob) -> Result<()> {
        let subject = subject(&job.queue);
        let payload = serde_json::to_vec(&job)?;

        self.jetstream
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| Error::operation("job_publish", e.to_string()))?
            .await
            .map_err(|e| Error::operation("job_publish_ack", e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET_QUEUE,
            job_id = %job.id,
            subject = %subject,
            "Submitted job to queue"
        );

        Ok(())
    }
}

async fn process_message(handler: &dyn JobHandler, message: jetstream::Message) {
    let mut job: ForwardJob = match serde_json::from_slice(&message.payload) {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(
                target: TRACING_TARGET_WORKER,
                error = %e,
                "Failed to deserialize job"
            );
            // Undecodable jobs can never succeed.
            settle(&message, AckKind::Term, None).await;
            return;
        }
    };

    job.attempts = message
        .info()
        .ok()
        .and_then(|info| u32::try_from(info.delivered).ok())
        .unwrap_or(1);

    let error = match handler.handle(&job).await {
        Ok(()) => {
            if let Err(e) = message.ack().await {
                tracing::error!(
                    target: TRACING_TARGET_WORKER,
                    job_id = %job.id,
                    error = %e,
                    "Failed to ack job"
                );
            }
            return;
        }
        Err(error) => error,
    };

    if job.can_retry() {
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
        settle(&message, AckKind::Nak(Some(delay)), Some(&job)).await;
        return;
    }

    handler.failed(&job, Some(&error)).await;
    settle(&message, AckKind::Term, Some(&job)).await;
}

/// Sends a nak or term, logging when JetStream does not receive it.
///
/// A lost nak falls back to redelivery after [`ACK_WAIT`].
async fn settle(message: &jetstream::Message, kind: AckKind, job: Option<&ForwardJob>) {
    let action = ack_action(&kind);
    let job_id = job.map(|job| job.id.to_string());
    if let Err(e) = message.ack_with(kind).await {
        tracing::error!(
            target: TRACING_TARGET_WORKER,
            job_id = job_id.as_deref(),
            action,
            error = %e,
            "Failed to settle job"
        );
    }
}

fn ack_action(kind: &AckKind) -> &'static str {
    match kind {
        AckKind::Nak(_) => "nak",
        AckKind::Term => "term",
        _ => "ack",
    }
}

fn subject(queue: &str) -> String {
    format!("{SUBJECT_PREFIX}.{}", subject_token(queue))
}

/// Maps a queue name onto a single subject token.
fn subject_token(queue: &str) -> String {
    queue
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' | ' ' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_generation() {
        assert_eq!(subject("default"), "relay.jobs.default");
        assert_eq!(subject("hooks.high"), "relay.jobs.hooks_high");
        assert_eq!(subject("a b*>"), "relay.jobs.a_b__");
    }

    #[test]
    fn test_ack_action_names() {
        assert_eq!(ack_action(&AckKind::Nak(Some(Duration::from_secs(5)))), "nak");
        assert_eq!(ack_action(&AckKind::Term), "term");
    }
}
