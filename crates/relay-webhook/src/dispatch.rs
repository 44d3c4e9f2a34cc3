//! Group dispatch with per-target failure isolation.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use crate::target::raw_target_url;
use crate::{
    DeliveryOutcome, GroupRegistry, OutcomeSink, Payload, Result, StrategyRegistry,
    TRACING_TARGET_DISPATCH, TargetConfig, WebhookResponse,
};

/// How the targets of one group are visited.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "config", derive(clap::ValueEnum))]
pub enum DispatchMode {
    /// One target after another, outcomes in declared order.
    #[default]
    Sequential,
    /// All targets at once, outcomes in completion order.
    Concurrent,
}

/// Options applied to every dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchOptions {
    /// Target visiting order.
    pub mode: DispatchMode,
    /// Log per-target failures at error level.
    pub log_failures: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Sequential,
            log_failures: true,
        }
    }
}

impl DispatchOptions {
    /// Sets the dispatch mode.
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables or disables failure logging.
    pub fn with_log_failures(mut self, log_failures: bool) -> Self {
        self.log_failures = log_failures;
        self
    }
}

/// Summary of one dispatch call.
///
/// Holds the same outcomes that were emitted to the sink, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Group the call resolved to.
    pub group: String,
    /// One outcome per target.
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    /// Number of `Sent` outcomes.
    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_sent()).count()
    }

    /// Number of `Failed` outcomes.
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

/// Fans a payload out to every target of a group.
///
/// Cloning is cheap; all clones share the same registries and sink.
/// Calls are independent and may run concurrently.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    groups: GroupRegistry,
    strategies: StrategyRegistry,
    sink: Arc<dyn OutcomeSink>,
    options: DispatchOptions,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("groups", &self.inner.groups.len())
            .field("strategies", &self.inner.strategies)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher over the given registries.
    pub fn new(
        groups: GroupRegistry,
        strategies: StrategyRegistry,
        sink: Arc<dyn OutcomeSink>,
        options: DispatchOptions,
    ) -> Self {
        let inner = DispatcherInner {
            groups,
            strategies,
            sink,
            options,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the group registry.
    pub fn groups(&self) -> &GroupRegistry {
        &self.inner.groups
    }

    /// Returns the strategy registry.
    pub fn strategies(&self) -> &StrategyRegistry {
        &self.inner.strategies
    }

    /// Returns the dispatch options.
    pub fn options(&self) -> DispatchOptions {
        self.inner.options
    }

    /// Delivers `payload` to every target of the named group.
    ///
    /// Exactly one outcome is emitted per target. Per-target problems
    /// (invalid descriptor, unknown strategy, transport fault) become
    /// `Failed` outcomes and never abort the call.
    ///
    /// # Errors
    ///
    /// Only group-level errors are returned, before any request is made:
    /// [`crate::Error::GroupNotFound`], [`crate::Error::InvalidGroupShape`]
    /// and [`crate::Error::EmptyTargetList`].
    #[tracing::instrument(
        target = TRACING_TARGET_DISPATCH,
        skip(self, payload),
        fields(group = group_name.unwrap_or_default())
    )]
    pub async fn dispatch(
        &self,
        source_url: &str,
        payload: &Payload,
        group_name: Option<&str>,
    ) -> Result<DispatchReport> {
        let group = self.inner.groups.resolve(group_name)?;
        let targets = group.targets();

        tracing::debug!(
            target: TRACING_TARGET_DISPATCH,
            group = group.name(),
            targets = targets.len(),
            mode = %self.inner.options.mode,
            "Dispatching webhook payload"
        );

        let mut outcomes = Vec::with_capacity(targets.len());
        match self.inner.options.mode {
            DispatchMode::Sequential => {
                for raw in targets {
                    let outcome = self.deliver(source_url, payload, raw).await;
                    self.inner.sink.emit(outcome.clone());
                    outcomes.push(outcome);
                }
            }
            DispatchMode::Concurrent => {
                let mut pending: FuturesUnordered<_> = targets
                    .iter()
                    .map(|raw| self.deliver(source_url, payload, raw))
                    .collect();

                while let Some(outcome) = pending.next().await {
                    self.inner.sink.emit(outcome.clone());
                    outcomes.push(outcome);
                }
            }
        }

        let report = DispatchReport {
            group: group.name().to_owned(),
            outcomes,
        };

        tracing::debug!(
            target: TRACING_TARGET_DISPATCH,
            group = %report.group,
            sent = report.sent(),
            failed = report.failed(),
            "Dispatch completed"
        );

        Ok(report)
    }

    /// Delivers to a single raw target; never fails.
    async fn deliver(&self, source_url: &str, payload: &Payload, raw: &Value) -> DeliveryOutcome {
        let target_url = raw_target_url(raw);

        let result: Result<WebhookResponse> = async {
            let target = TargetConfig::from_value(raw)?;
            let strategy = self.inner.strategies.resolve(target.strategy_id())?;
            strategy.send(source_url, payload, &target).await
        }
        .await;

        match result {
            Ok(response) => DeliveryOutcome::sent(source_url, target_url, response.status_code),
            Err(error) => {
                if self.inner.options.log_failures {
                    tracing::error!(
                        target: TRACING_TARGET_DISPATCH,
                        source_url,
                        target_url = %target_url,
                        kind = %error.kind(),
                        error = %error,
                        "Failed to forward webhook"
                    );
                }
                DeliveryOutcome::failed(source_url, target_url, &error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::mock::MockTransport;
    use crate::{ChannelSink, ErrorKind, HttpMethod, WebhookTransport};

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn dispatcher(
        groups: GroupRegistry,
        transport: Arc<MockTransport>,
        mode: DispatchMode,
    ) -> (Dispatcher, mpsc::UnboundedReceiver<DeliveryOutcome>) {
        let transport: Arc<dyn WebhookTransport> = transport;
        let strategies = StrategyRegistry::builtin(transport, Duration::from_secs(30));
        let (sink, receiver) = ChannelSink::new();
        let options = DispatchOptions::default().with_mode(mode);
        let dispatcher = Dispatcher::new(groups, strategies, Arc::new(sink), options);
        (dispatcher, receiver)
    }

    fn drain(receiver: &mut mpsc::UnboundedReceiver<DeliveryOutcome>) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(outcome) = receiver.try_recv() {
            outcomes.push(outcome);
        }
        outcomes
    }

    #[tokio::test]
    async fn test_single_target_default_group() {
        let transport = Arc::new(MockTransport::new());
        let groups = GroupRegistry::new("default")
            .with_targets("default", [TargetConfig::new("https://x.test/test")]);
        let (dispatcher, mut receiver) =
            dispatcher(groups, transport.clone(), DispatchMode::Sequential);

        let report = dispatcher
            .dispatch("https://src.test", &payload(json!({"a": 1})), None)
            .await
            .unwrap();

        assert_eq!(report.group, "default");
        assert_eq!(
            drain(&mut receiver),
            vec![DeliveryOutcome::sent("https://src.test", "https://x.test/test", 200)]
        );

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].body, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_failed_target_does_not_block_next() {
        let transport =
            Arc::new(MockTransport::new().with_connection_error("https://a.test/hook"));
        let groups = GroupRegistry::new("default").with_targets(
            "g",
            [
                TargetConfig::new("https://a.test/hook"),
                TargetConfig::new("https://b.test/hook"),
            ],
        );
        let (dispatcher, mut receiver) =
            dispatcher(groups, transport.clone(), DispatchMode::Sequential);

        let report = dispatcher
            .dispatch("https://src.test", &Payload::new(), Some("g"))
            .await
            .unwrap();

        let outcomes = drain(&mut receiver);
        assert_eq!(outcomes, report.outcomes);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_failed());
        assert_eq!(outcomes[0].target_url(), "https://a.test/hook");
        assert_eq!(outcomes[1].target_url(), "https://b.test/hook");
        assert_eq!(outcomes[1].status_code(), Some(200));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_isolation_for_every_position() {
        let urls: Vec<String> = (0..4).map(|i| format!("https://t{i}.test/hook")).collect();

        for failing in 0..urls.len() {
            let transport = Arc::new(MockTransport::new().with_timeout(urls[failing].clone()));
            let groups = GroupRegistry::new("default")
                .with_targets("default", urls.iter().map(TargetConfig::new));

            for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
                let (dispatcher, mut receiver) = dispatcher(groups.clone(), transport.clone(), mode);
                let report = dispatcher
                    .dispatch("https://src.test", &Payload::new(), None)
                    .await
                    .unwrap();

                assert_eq!(report.failed(), 1, "failing {failing} mode {mode}");
                assert_eq!(report.sent(), urls.len() - 1);

                let outcomes = drain(&mut receiver);
                assert_eq!(outcomes.len(), urls.len());
                let failed: Vec<_> = outcomes.iter().filter(|o| o.is_failed()).collect();
                assert_eq!(failed[0].target_url(), urls[failing]);
            }
        }
    }

    #[tokio::test]
    async fn test_error_status_is_still_sent() {
        let transport = Arc::new(MockTransport::new().with_status("https://x.test/hook", 400));
        let groups = GroupRegistry::new("default")
            .with_targets("default", [TargetConfig::new("https://x.test/hook")]);
        let (dispatcher, _receiver) = dispatcher(groups, transport, DispatchMode::Sequential);

        let report = dispatcher
            .dispatch("https://src.test", &Payload::new(), None)
            .await
            .unwrap();

        assert_eq!(report.sent(), 1);
        assert_eq!(report.outcomes[0].status_code(), Some(400));
        assert!(!report.outcomes[0].is_success_status());
    }

    #[tokio::test]
    async fn test_unknown_group_makes_no_calls() {
        let transport = Arc::new(MockTransport::new());
        let groups = GroupRegistry::new("default")
            .with_targets("default", [TargetConfig::new("https://x.test/hook")]);
        let (dispatcher, mut receiver) =
            dispatcher(groups, transport.clone(), DispatchMode::Sequential);

        let error = dispatcher
            .dispatch("https://src.test", &Payload::new(), Some("ghost"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::GroupNotFound);
        assert_eq!(transport.request_count(), 0);
        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_targets_are_per_target_failures() {
        let transport = Arc::new(MockTransport::new());
        let groups = GroupRegistry::new("default").with_group(
            "default",
            json!({"targets": [
                {"method": "POST"},
                "https://scalar.test",
                {"url": "https://ok.test/hook", "strategy": "slack"},
                {"url": "https://ok.test/hook", "method": "BREW"},
                {"url": "https://ok.test/hook", "headers": {"X-Id": 7}},
            ]}),
        );
        let (dispatcher, mut receiver) =
            dispatcher(groups, transport.clone(), DispatchMode::Sequential);

        dispatcher
            .dispatch("https://src.test", &Payload::new(), None)
            .await
            .unwrap();

        let outcomes = drain(&mut receiver);
        let kinds: Vec<_> = outcomes
            .iter()
            .map(|o| match o {
                DeliveryOutcome::Failed { kind, .. } => Some(*kind),
                DeliveryOutcome::Sent { .. } => None,
            })
            .collect();

        assert_eq!(
            kinds,
            vec![
                Some(ErrorKind::InvalidTarget),
                Some(ErrorKind::InvalidTarget),
                Some(ErrorKind::UnknownStrategy),
                Some(ErrorKind::InvalidTarget),
                None,
            ]
        );
        assert_eq!(outcomes[0].target_url(), "unknown");
        assert_eq!(outcomes[1].target_url(), "unknown");
        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.requests()[0].header("x-id"), Some("7"));
    }

    #[tokio::test]
    async fn test_mixed_strategies() {
        let transport = Arc::new(MockTransport::new());
        let groups = GroupRegistry::new("default").with_targets(
            "ops",
            [
                TargetConfig::new("https://generic.test/hook").with_method("PUT"),
                TargetConfig::new("https://discord.test/api/webhooks/1")
                    .with_method("PUT")
                    .with_strategy("discord"),
            ],
        );
        let (dispatcher, _receiver) =
            dispatcher(groups, transport.clone(), DispatchMode::Sequential);

        let report = dispatcher
            .dispatch("https://src.test/in", &payload(json!({"k": "v"})), Some("ops"))
            .await
            .unwrap();
        assert_eq!(report.sent(), 2);

        let requests = transport.requests();
        assert_eq!(requests[0].method, HttpMethod::Put);
        assert_eq!(requests[0].body, Some(json!({"k": "v"})));
        assert_eq!(requests[1].method, HttpMethod::Post);
        assert_eq!(
            requests[1].body,
            Some(json!({"content": "https://src.test/in\n{\"k\":\"v\"}"}))
        );
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_are_independent() {
        let transport = Arc::new(MockTransport::new());
        let groups = GroupRegistry::new("a")
            .with_targets("a", [TargetConfig::new("https://a.test/hook")])
            .with_targets("b", [TargetConfig::new("https://b.test/hook")]);
        let (dispatcher, _receiver) =
            dispatcher(groups, transport.clone(), DispatchMode::Concurrent);

        let body = Payload::new();
        let (a, b) = tokio::join!(
            dispatcher.dispatch("https://src.test", &body, Some("a")),
            dispatcher.dispatch("https://src.test", &body, Some("b")),
        );

        assert_eq!(a.unwrap().outcomes[0].target_url(), "https://a.test/hook");
        assert_eq!(b.unwrap().outcomes[0].target_url(), "https://b.test/hook");
        assert_eq!(transport.request_count(), 2);
    }
}
