//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig         # Host, port, body limit, shutdown
//! ├── forwarder: ForwarderConfig   # Config file, groups, retries, queue
//! ├── http: ReqwestConfig          # Outbound connection settings
//! └── nats: NatsConfig             # JetStream queue (feature `nats`)
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.
//!
//! # Example
//!
//! ```bash
//! relay --config relay.json --port 8080
//!
//! # Or via environment variables
//! RELAY_CONFIG=relay.json RELAY_PORT=8080 relay
//! ```

mod forwarder;
#[cfg(feature = "nats")]
mod nats;
mod server;

use std::process;

use anyhow::Context;
use clap::{Parser, ValueEnum};
pub use forwarder::{FileConfig, ForwarderConfig, ForwarderSettings};
#[cfg(feature = "nats")]
pub use nats::NatsConfig;
use relay_webhook::reqwest::ReqwestConfig;
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Output format of the log subscriber.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "relay")]
#[command(about = "Forwards inbound HTTP requests to groups of webhooks")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// Webhook groups, delivery and retry configuration.
    #[clap(flatten)]
    pub forwarder: ForwarderConfig,

    /// Outbound HTTP client configuration.
    #[clap(flatten)]
    pub http: ReqwestConfig,

    /// JetStream queue configuration.
    #[cfg(feature = "nats")]
    #[clap(flatten)]
    pub nats: NatsConfig,

    /// Log output format.
    #[arg(long, env = "RELAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);

        match self.log_format {
            LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .init(),
        }
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.forwarder
            .validate()
            .context("invalid forwarder configuration")?;
        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();
        self.server.log();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            config_path = ?self.forwarder.config_path,
            connect_timeout_secs = self.http.effective_connect_timeout().as_secs(),
            user_agent = %self.http.effective_user_agent(),
            "Client configuration"
        );
    }

    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [
            cfg!(feature = "nats").then_some("nats"),
            cfg!(feature = "dotenv").then_some("dotenv"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "relay",
            "--port",
            "9000",
            "--config",
            "relay.json",
            "--backoff",
            "1,2,3",
            "--dispatch-mode",
            "concurrent",
            "--log-failures",
            "false",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.server.port, 9000);
        assert_eq!(
            cli.forwarder.config_path.as_deref(),
            Some(std::path::Path::new("relay.json"))
        );
        assert_eq!(cli.forwarder.backoff, Some(vec![1, 2, 3]));
        assert_eq!(
            cli.forwarder.dispatch_mode,
            Some(relay_webhook::DispatchMode::Concurrent)
        );
        assert_eq!(cli.forwarder.log_failures, Some(false));
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
