//! Assembly of the dispatcher, the queue runtime and the service state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use relay_queue::{ForwardHandler, Forwarder, JobQueue, LocalQueue};
use relay_server::service::ServiceState;
use relay_webhook::reqwest::ReqwestClient;
use relay_webhook::{ConfigIssue, Dispatcher, StrategyRegistry, TracingSink};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::{Cli, ForwarderSettings};
use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_SHUTDOWN};

/// Running forwarder: service state plus the queue workers behind it.
pub struct Runtime {
    state: ServiceState,
    local: Option<LocalQueue>,
    cancel_token: CancellationToken,
    workers: TaskTracker,
}

impl Runtime {
    /// Builds the dispatcher and starts the queue runtime.
    pub async fn start(cli: &Cli, settings: ForwarderSettings) -> anyhow::Result<Self> {
        let transport =
            ReqwestClient::new(cli.http.clone()).context("failed to create HTTP client")?;
        let strategies = StrategyRegistry::builtin(Arc::new(transport), settings.default_timeout);

        log_config_issues(
            &settings
                .groups
                .validate(&strategies, settings.default_timeout),
        );

        let dispatcher = Dispatcher::new(
            settings.groups,
            strategies,
            Arc::new(TracingSink),
            settings.options,
        );
        let handler = Arc::new(ForwardHandler::new(
            dispatcher.clone(),
            settings.options.log_failures,
        ));

        let cancel_token = CancellationToken::new();
        let workers = TaskTracker::new();

        #[cfg(feature = "nats")]
        if let Some(url) = &cli.nats.nats_url {
            let queue = start_nats(
                url,
                &settings.queue_name,
                settings.queue.concurrency,
                handler,
                &cancel_token,
                &workers,
            )
            .await?;
            let forwarder = Forwarder::new(queue, settings.policy)
                .with_queue_name(settings.queue_name);

            return Ok(Self {
                state: ServiceState::new(dispatcher, forwarder),
                local: None,
                cancel_token,
                workers,
            });
        }

        let local = LocalQueue::with_cancel_token(handler, settings.queue, cancel_token.clone());
        let queue: Arc<dyn JobQueue> = Arc::new(local.clone());
        let forwarder = Forwarder::new(queue, settings.policy).with_queue_name(settings.queue_name);

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            concurrency = settings.queue.concurrency,
            "Using in-process job queue"
        );

        Ok(Self {
            state: ServiceState::new(dispatcher, forwarder),
            local: Some(local),
            cancel_token,
            workers,
        })
    }

    /// Returns the state shared by the handlers.
    pub fn state(&self) -> ServiceState {
        self.state.clone()
    }

    /// Stops the queue workers, waiting at most `timeout` for in-flight jobs.
    pub async fn shutdown(self, timeout: Duration) {
        self.cancel_token.cancel();
        self.workers.close();

        let drain = async {
            if let Some(local) = &self.local {
                local.shutdown().await;
            }
            self.workers.wait().await;
        };

        if tokio::time::timeout(timeout, drain).await.is_err() {
            tracing::warn!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                timeout_secs = timeout.as_secs(),
                "Queue workers did not stop in time"
            );
        } else {
            tracing::info!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                "Queue workers stopped"
            );
        }
    }
}

#[cfg(feature = "nats")]
async fn start_nats(
    url: &str,
    queue_name: &str,
    concurrency: usize,
    handler: Arc<ForwardHandler>,
    cancel_token: &CancellationToken,
    workers: &TaskTracker,
) -> anyhow::Result<Arc<dyn JobQueue>> {
    use relay_queue::nats::NatsQueue;

    let client = async_nats::connect(url)
        .await
        .with_context(|| format!("failed to connect to NATS at {url}"))?;
    let jetstream = async_nats::jetstream::new(client);
    let queue = NatsQueue::new(&jetstream)
        .await
        .context("failed to open the job stream")?;

    for _ in 0..concurrency.max(1) {
        let queue = queue.clone();
        let handler = handler.clone();
        let cancel_token = cancel_token.clone();
        let queue_name = queue_name.to_owned();

        workers.spawn(async move {
            if let Err(error) = queue.run_worker(&queue_name, handler, cancel_token).await {
                tracing::error!(
                    target: TRACING_TARGET_SERVER_SHUTDOWN,
                    queue = %queue_name,
                    error = %error,
                    "Queue worker stopped with an error"
                );
            }
        });
    }

    tracing::info!(
        target: TRACING_TARGET_CONFIG,
        queue = %queue_name,
        workers = concurrency,
        "Using JetStream job queue"
    );

    Ok(Arc::new(queue))
}

/// Logs each configuration defect found at startup.
fn log_config_issues(issues: &[ConfigIssue]) {
    for issue in issues {
        tracing::warn!(
            target: TRACING_TARGET_CONFIG,
            group = %issue.group,
            target_index = issue.target,
            issue = %issue.message,
            "Webhook configuration issue"
        );
    }

    if issues.is_empty() {
        tracing::debug!(target: TRACING_TARGET_CONFIG, "Webhook configuration is valid");
    }
}
