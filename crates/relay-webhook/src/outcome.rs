//! Per-target delivery outcomes and the sinks that observe them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{Error, ErrorKind, TRACING_TARGET_DISPATCH};

/// Result of one delivery attempt to one target.
///
/// Exactly one outcome is emitted per target per dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The target answered; any status code counts.
    Sent {
        source_url: String,
        target_url: String,
        status_code: u16,
    },
    /// The target could not be reached or its descriptor was rejected.
    Failed {
        source_url: String,
        target_url: String,
        kind: ErrorKind,
        cause: String,
    },
}

impl DeliveryOutcome {
    /// Creates a `Sent` outcome.
    pub fn sent(
        source_url: impl Into<String>,
        target_url: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self::Sent {
            source_url: source_url.into(),
            target_url: target_url.into(),
            status_code,
        }
    }

    /// Creates a `Failed` outcome from a per-target error.
    pub fn failed(
        source_url: impl Into<String>,
        target_url: impl Into<String>,
        error: &Error,
    ) -> Self {
        Self::Failed {
            source_url: source_url.into(),
            target_url: target_url.into(),
            kind: error.kind(),
            cause: error.to_string(),
        }
    }

    /// Url of the inbound request that triggered the delivery.
    pub fn source_url(&self) -> &str {
        match self {
            Self::Sent { source_url, .. } | Self::Failed { source_url, .. } => source_url,
        }
    }

    /// Url of the target, or `unknown` when the descriptor had none.
    pub fn target_url(&self) -> &str {
        match self {
            Self::Sent { target_url, .. } | Self::Failed { target_url, .. } => target_url,
        }
    }

    /// Returns `true` for `Sent` outcomes.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    /// Returns `true` for `Failed` outcomes.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Status code of a `Sent` outcome.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Sent { status_code, .. } => Some(*status_code),
            Self::Failed { .. } => None,
        }
    }

    /// Returns `true` for a `Sent` outcome with a 2xx status.
    pub fn is_success_status(&self) -> bool {
        self.status_code()
            .is_some_and(|status| (200..300).contains(&status))
    }
}

/// Observer of delivery outcomes.
///
/// Called once per target, in completion order, from the dispatching task.
/// Implementations must not block.
pub trait OutcomeSink: Send + Sync {
    /// Receives one outcome.
    fn emit(&self, outcome: DeliveryOutcome);
}

impl<F> OutcomeSink for F
where
    F: Fn(DeliveryOutcome) + Send + Sync,
{
    fn emit(&self, outcome: DeliveryOutcome) {
        self(outcome)
    }
}

/// Sink that records outcomes as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutcomeSink for TracingSink {
    fn emit(&self, outcome: DeliveryOutcome) {
        match &outcome {
            DeliveryOutcome::Sent {
                source_url,
                target_url,
                status_code,
            } => tracing::debug!(
                target: TRACING_TARGET_DISPATCH,
                source_url = %source_url,
                target_url = %target_url,
                status_code,
                "Webhook sent"
            ),
            DeliveryOutcome::Failed {
                source_url,
                target_url,
                kind,
                cause,
            } => tracing::debug!(
                target: TRACING_TARGET_DISPATCH,
                source_url = %source_url,
                target_url = %target_url,
                kind = %kind,
                cause = %cause,
                "Webhook failed"
            ),
        }
    }
}

/// Sink that forwards outcomes into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<DeliveryOutcome>,
}

impl ChannelSink {
    /// Creates the sink together with its receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeliveryOutcome>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl OutcomeSink for ChannelSink {
    fn emit(&self, outcome: DeliveryOutcome) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.sender.send(outcome);
    }
}

/// Sink that forwards every outcome to several sinks in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn OutcomeSink>>,
}

impl fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl FanoutSink {
    /// Creates an empty fanout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sink.
    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl OutcomeSink for FanoutSink {
    fn emit(&self, outcome: DeliveryOutcome) {
        for sink in &self.sinks {
            sink.emit(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_sent_accessors() {
        let outcome = DeliveryOutcome::sent("https://in.test/a", "https://out.test/b", 404);

        assert!(outcome.is_sent());
        assert!(!outcome.is_failed());
        assert_eq!(outcome.status_code(), Some(404));
        assert!(!outcome.is_success_status());
        assert_eq!(outcome.source_url(), "https://in.test/a");
        assert_eq!(outcome.target_url(), "https://out.test/b");
    }

    #[test]
    fn test_failed_from_error() {
        let error = Error::transport("Connection refused");
        let outcome = DeliveryOutcome::failed("https://in.test", "unknown", &error);

        assert!(outcome.is_failed());
        assert_eq!(outcome.status_code(), None);
        match outcome {
            DeliveryOutcome::Failed { kind, cause, .. } => {
                assert_eq!(kind, ErrorKind::Transport);
                assert!(cause.contains("Connection refused"));
            }
            DeliveryOutcome::Sent { .. } => panic!("expected failed outcome"),
        }
    }

    #[test]
    fn test_serialized_shape() {
        let outcome = DeliveryOutcome::sent("https://in.test", "https://out.test", 200);
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "outcome": "sent",
                "source_url": "https://in.test",
                "target_url": "https://out.test",
                "status_code": 200,
            })
        );

        let outcome =
            DeliveryOutcome::failed("https://in.test", "x", &Error::invalid_target("bad"));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["kind"], "invalid_target");
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sink, mut receiver) = ChannelSink::new();
        sink.emit(DeliveryOutcome::sent("a", "b", 201));
        drop(sink);

        assert_eq!(receiver.recv().await.unwrap().status_code(), Some(201));
        assert!(receiver.recv().await.is_none());
    }

    #[test]
    fn test_fanout_and_closure_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let seen = seen.clone();
            move |outcome: DeliveryOutcome| seen.lock().unwrap().push(outcome)
        };

        let fanout = FanoutSink::new()
            .with_sink(Arc::new(TracingSink))
            .with_sink(Arc::new(recorder));
        fanout.emit(DeliveryOutcome::sent("a", "b", 200));

        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
