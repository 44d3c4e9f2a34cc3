//! Pluggable delivery strategies.
//!
//! A strategy turns `(source_url, payload, target)` into exactly one outbound
//! call through a [`WebhookTransport`]. Strategies are looked up by
//! identifier in a [`StrategyRegistry`], which holds the built-in
//! [`StrategyKind`] variants plus any custom registrations.

mod discord;
mod generic;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use discord::DiscordStrategy;
pub use generic::GenericStrategy;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{Error, Payload, Result, TargetConfig, WebhookResponse, WebhookTransport};

/// Identifier of the strategy used when a target names none.
pub const DEFAULT_STRATEGY: &str = "generic";

/// Delivery capability for one kind of webhook endpoint.
#[async_trait::async_trait]
pub trait DeliveryStrategy: Send + Sync {
    /// Validates `target`, builds the outbound call and sends it.
    ///
    /// Returns the remote response for any status code; fails only on
    /// invalid targets, encoding problems or transport faults.
    async fn send(
        &self,
        source_url: &str,
        payload: &Payload,
        target: &TargetConfig,
    ) -> Result<WebhookResponse>;
}

/// Built-in delivery strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StrategyKind {
    /// JSON body with the target's method and headers.
    Generic,
    /// Chat message body, always POST.
    Discord,
}

impl StrategyKind {
    /// Instantiates the strategy on top of `transport`.
    pub fn build(
        self,
        transport: Arc<dyn WebhookTransport>,
        default_timeout: Duration,
    ) -> Arc<dyn DeliveryStrategy> {
        match self {
            Self::Generic => Arc::new(GenericStrategy::new(transport, default_timeout)),
            Self::Discord => Arc::new(DiscordStrategy::new(transport, default_timeout)),
        }
    }
}

/// Registry of delivery strategies keyed by identifier.
///
/// Identifiers are matched after trimming and ASCII lowercasing.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn DeliveryStrategy>>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.ids().collect();
        ids.sort_unstable();
        f.debug_struct("StrategyRegistry")
            .field("strategies", &ids)
            .finish()
    }
}

impl StrategyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every [`StrategyKind`] registered.
    pub fn builtin(transport: Arc<dyn WebhookTransport>, default_timeout: Duration) -> Self {
        let mut registry = Self::new();
        for kind in StrategyKind::iter() {
            registry.register(kind.as_ref(), kind.build(transport.clone(), default_timeout));
        }
        registry
    }

    /// Registers a strategy, replacing any previous one with the same id.
    pub fn register(&mut self, id: &str, strategy: Arc<dyn DeliveryStrategy>) {
        self.strategies.insert(normalize(id), strategy);
    }

    /// Registers a strategy and returns the registry.
    pub fn with_strategy(mut self, id: &str, strategy: Arc<dyn DeliveryStrategy>) -> Self {
        self.register(id, strategy);
        self
    }

    /// Looks up the strategy registered under `id`.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn DeliveryStrategy>> {
        self.strategies
            .get(&normalize(id))
            .cloned()
            .ok_or_else(|| Error::unknown_strategy(id))
    }

    /// Returns whether a strategy is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.strategies.contains_key(&normalize(id))
    }

    /// Iterates over the registered identifiers.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }
}

fn normalize(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}
