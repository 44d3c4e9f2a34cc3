//! JetStream queue configuration.

use clap::Args;
use serde::{Deserialize, Serialize};

/// NATS connection used for the JetStream job queue.
///
/// When no url is given, forward jobs run on the in-process queue.
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct NatsConfig {
    /// NATS server url, e.g. `nats://127.0.0.1:4222`.
    #[arg(long, env = "RELAY_NATS_URL")]
    pub nats_url: Option<String>,
}
