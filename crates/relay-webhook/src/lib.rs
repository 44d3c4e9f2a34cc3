#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod dispatch;
mod error;
mod group;
mod outcome;
mod target;

pub mod request;
pub mod response;
pub mod strategy;

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod reqwest;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

pub use dispatch::{DispatchMode, DispatchOptions, DispatchReport, Dispatcher};
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use group::{ConfigIssue, DEFAULT_GROUP_NAME, GroupRegistry, ResolvedGroup};
pub use outcome::{ChannelSink, DeliveryOutcome, FanoutSink, OutcomeSink, TracingSink};
pub use request::WebhookRequest;
pub use response::WebhookResponse;
pub use strategy::{DeliveryStrategy, StrategyKind, StrategyRegistry};
pub use target::{DEFAULT_TIMEOUT_SECS, HttpMethod, TargetConfig, UNKNOWN_TARGET};

/// Tracing target for strategy and transport operations.
pub const TRACING_TARGET: &str = "relay_webhook";

/// Tracing target for dispatch operations.
pub const TRACING_TARGET_DISPATCH: &str = "relay_webhook::dispatch";

/// Payload forwarded to webhook targets.
///
/// The inbound request body (plus captured query parameters) as a JSON object.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Outbound HTTP seam used by every [`DeliveryStrategy`].
///
/// Implement this trait to plug in a different HTTP stack. A transport
/// performs exactly one request per call and never retries; any received
/// status code is returned as a [`WebhookResponse`], only transport-level
/// faults are errors.
#[async_trait::async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Sends a single outbound request to the target endpoint.
    async fn send(&self, request: WebhookRequest) -> Result<WebhookResponse>;
}
