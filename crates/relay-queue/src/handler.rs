//! Job execution and terminal failure reporting.

use jiff::Timestamp;
use relay_webhook::Dispatcher;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{Error, ForwardJob, Result, TRACING_TARGET_WORKER};

/// Reported error when a job fails without one.
const UNKNOWN_ERROR: &str = "unknown error";

/// Executes forward jobs on behalf of a queue runtime.
///
/// The runtime owns retry timing: it calls [`handle`](Self::handle) once per
/// attempt and [`failed`](Self::failed) exactly once when attempts run out.
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Runs one attempt. An error marks the attempt as failed.
    async fn handle(&self, job: &ForwardJob) -> Result<()>;

    /// Called once after the last attempt failed.
    async fn failed(&self, job: &ForwardJob, error: Option<&Error>);
}

/// Terminal failure of a job whose attempts are exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermanentFailure {
    pub job_id: Uuid,
    /// Url of the inbound request.
    pub url: String,
    pub group_name: Option<String>,
    pub attempts: u32,
    /// Message of the last error, or `unknown error`.
    pub error: String,
    pub failed_at: Timestamp,
}

impl PermanentFailure {
    /// Builds the report for `job`.
    pub fn new(job: &ForwardJob, error: Option<&Error>) -> Self {
        Self {
            job_id: job.id,
            url: job.url.clone(),
            group_name: job.group_name.clone(),
            attempts: job.attempts,
            error: error.map_or_else(|| UNKNOWN_ERROR.to_owned(), ToString::to_string),
            failed_at: Timestamp::now(),
        }
    }
}

/// Handler that runs jobs through a [`Dispatcher`].
///
/// Per-target delivery failures never fail the job; only group-level
/// dispatch errors do.
#[derive(Debug, Clone)]
pub struct ForwardHandler {
    dispatcher: Dispatcher,
    log_failures: bool,
    reports: Option<mpsc::UnboundedSender<PermanentFailure>>,
}

impl ForwardHandler {
    /// Creates a handler; `log_failures` gates the permanent-failure log.
    pub fn new(dispatcher: Dispatcher, log_failures: bool) -> Self {
        Self {
            dispatcher,
            log_failures,
            reports: None,
        }
    }

    /// Also sends every permanent-failure report to `sender`.
    pub fn with_reports(mut self, sender: mpsc::UnboundedSender<PermanentFailure>) -> Self {
        self.reports = Some(sender);
        self
    }

    /// Returns the wrapped dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[async_trait::async_trait]
impl JobHandler for ForwardHandler {
    async fn handle(&self, job: &ForwardJob) -> Result<()> {
        let report = self
            .dispatcher
            .dispatch(&job.url, &job.payload, job.group())
            .await?;

        tracing::debug!(
            target: TRACING_TARGET_WORKER,
            job_id = %job.id,
            attempt = job.attempts,
            group = %report.group,
            sent = report.sent(),
            failed = report.failed(),
            "Forward job dispatched"
        );

        Ok(())
    }

    async fn failed(&self, job: &ForwardJob, error: Option<&Error>) {
        let report = PermanentFailure::new(job, error);

        if self.log_failures {
            tracing::error!(
                target: TRACING_TARGET_WORKER,
                job_id = %report.job_id,
                url = %report.url,
                webhook_name = report.group_name.as_deref(),
                attempts = report.attempts,
                error = %report.error,
                "Queue job failed permanently"
            );
        }

        if let Some(sender) = &self.reports {
            let _ = sender.send(report);
        }
    }
}
