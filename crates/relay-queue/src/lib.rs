#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for job submission.
pub const TRACING_TARGET_QUEUE: &str = "relay_queue::queue";

/// Tracing target for job execution and retries.
pub const TRACING_TARGET_WORKER: &str = "relay_queue::worker";

mod backoff;
mod error;
mod handler;
mod job;
mod local;
mod queue;

#[cfg(feature = "nats")]
#[cfg_attr(docsrs, doc(cfg(feature = "nats")))]
pub mod nats;

pub use backoff::{Backoff, DEFAULT_BACKOFF_SECS, DEFAULT_TRIES, RetryPolicy};
pub use error::{Error, Result};
pub use handler::{ForwardHandler, JobHandler, PermanentFailure};
pub use job::ForwardJob;
pub use local::{LocalQueue, LocalQueueConfig};
pub use queue::{DEFAULT_QUEUE, Forwarder, JobQueue, queue_or_default};
