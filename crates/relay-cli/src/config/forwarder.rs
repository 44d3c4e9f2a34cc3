//! Forwarder configuration: webhook groups, delivery and retry settings.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result as AnyhowResult, anyhow};
use clap::Args;
use relay_queue::{LocalQueueConfig, RetryPolicy, queue_or_default};
use relay_webhook::{
    DEFAULT_GROUP_NAME, DEFAULT_TIMEOUT_SECS, DispatchMode, DispatchOptions, GroupRegistry,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::TRACING_TARGET_CONFIG;

/// Forwarder configuration.
///
/// Groups come from the JSON file given by `--config`; every other value can
/// be set in that file and overridden by a flag or environment variable.
///
/// # Environment Variables
///
/// - `RELAY_CONFIG` - Path to the JSON configuration file
/// - `RELAY_DEFAULT_GROUP` - Group used when a request names none
/// - `RELAY_TIMEOUT` - Default per-target timeout in seconds (default: 30)
/// - `RELAY_TRIES` - Attempts per forward job (default: 3)
/// - `RELAY_BACKOFF` - Comma-separated retry delays in seconds (default: 5,30,60)
/// - `RELAY_LOG_FAILURES` - Log delivery and job failures (default: true)
/// - `RELAY_QUEUE` - Queue forward jobs are submitted to (default: default)
/// - `RELAY_DISPATCH_MODE` - `sequential` or `concurrent` (default: sequential)
/// - `RELAY_WORKER_CONCURRENCY` - Jobs in flight per queue (default: 4)
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct ForwarderConfig {
    /// Path to the JSON configuration file.
    #[arg(short = 'c', long = "config", env = "RELAY_CONFIG")]
    pub config_path: Option<PathBuf>,

    /// Group used when a request names none.
    #[arg(long, env = "RELAY_DEFAULT_GROUP")]
    pub default_group: Option<String>,

    /// Default per-target timeout in seconds.
    #[arg(long, env = "RELAY_TIMEOUT")]
    pub timeout: Option<f64>,

    /// Attempts per forward job; values below one fall back to 3.
    #[arg(long, env = "RELAY_TRIES")]
    pub tries: Option<i64>,

    /// Retry delays in seconds, one value for a fixed delay.
    #[arg(long, env = "RELAY_BACKOFF", value_delimiter = ',', allow_negative_numbers = true)]
    pub backoff: Option<Vec<i64>>,

    /// Log delivery and permanent job failures.
    #[arg(long, env = "RELAY_LOG_FAILURES")]
    pub log_failures: Option<bool>,

    /// Queue forward jobs are submitted to; blank selects the default queue.
    #[arg(long = "queue", env = "RELAY_QUEUE")]
    pub queue_name: Option<String>,

    /// How the targets of one group are visited.
    #[arg(long, env = "RELAY_DISPATCH_MODE", value_enum)]
    pub dispatch_mode: Option<DispatchMode>,

    /// Jobs in flight per queue.
    #[arg(long, env = "RELAY_WORKER_CONCURRENCY", default_value_t = 4)]
    #[serde(default = "default_concurrency")]
    pub worker_concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            default_group: None,
            timeout: None,
            tries: None,
            backoff: None,
            log_failures: None,
            queue_name: None,
            dispatch_mode: None,
            worker_concurrency: default_concurrency(),
        }
    }
}

/// Contents of the JSON configuration file.
///
/// `timeout`, `tries` and `backoff` stay loosely typed; invalid values fall
/// back to their defaults the same way as the flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub default_webhook_group_name: Option<String>,
    pub webhooks: Map<String, Value>,
    pub timeout: Option<Value>,
    pub tries: Option<Value>,
    pub backoff: Option<Value>,
    pub log_failures: Option<bool>,
    pub queue_name: Option<String>,
    pub dispatch_mode: Option<DispatchMode>,
}

impl FileConfig {
    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> AnyhowResult<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Forwarder settings after merging the file with flags.
#[derive(Debug, Clone)]
pub struct ForwarderSettings {
    pub groups: GroupRegistry,
    pub default_timeout: Duration,
    pub policy: RetryPolicy,
    pub options: DispatchOptions,
    pub queue_name: String,
    pub queue: LocalQueueConfig,
}

impl ForwarderConfig {
    /// Validates flag values that have no fallback.
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.worker_concurrency == 0 || self.worker_concurrency > 1024 {
            return Err(anyhow!(
                "Worker concurrency {} is invalid. Must be between 1 and 1024.",
                self.worker_concurrency
            ));
        }

        if let Some(timeout) = self.timeout {
            positive_duration(timeout)?;
        }

        Ok(())
    }

    /// Loads the configuration file, if any, and applies the overrides.
    pub fn resolve(&self) -> AnyhowResult<ForwarderSettings> {
        let file = match &self.config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        self.resolve_with(file)
    }

    /// Applies the overrides on top of `file`.
    pub fn resolve_with(&self, file: FileConfig) -> AnyhowResult<ForwarderSettings> {
        let default_group = self
            .default_group
            .clone()
            .or(file.default_webhook_group_name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GROUP_NAME.to_owned());

        let timeout = match (self.timeout, &file.timeout) {
            (Some(timeout), _) => timeout,
            (None, Some(value)) => seconds(value)
                .with_context(|| format!("timeout {value} is not a number of seconds"))?,
            (None, None) => DEFAULT_TIMEOUT_SECS as f64,
        };

        let tries = self.tries.map(Value::from).or(file.tries);
        let backoff = match &self.backoff {
            Some(values) if values.len() == 1 => Some(Value::from(values[0])),
            Some(values) => Some(Value::from(values.clone())),
            None => file.backoff,
        };

        let options = DispatchOptions::default()
            .with_mode(self.dispatch_mode.or(file.dispatch_mode).unwrap_or_default())
            .with_log_failures(self.log_failures.or(file.log_failures).unwrap_or(true));

        let queue_name = queue_or_default(self.queue_name.as_deref().or(file.queue_name.as_deref()))
            .to_owned();

        Ok(ForwarderSettings {
            groups: GroupRegistry::from_groups(default_group, file.webhooks),
            default_timeout: positive_duration(timeout)?,
            policy: RetryPolicy::from_values(tries.as_ref(), backoff.as_ref()),
            options,
            queue_name,
            queue: LocalQueueConfig::default().with_concurrency(self.worker_concurrency),
        })
    }
}

impl ForwarderSettings {
    /// Logs the resolved settings.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            default_group = %self.groups.default_group(),
            groups = self.groups.len(),
            default_timeout_secs = self.default_timeout.as_secs_f64(),
            tries = self.policy.max_attempts,
            backoff = ?self.policy.backoff,
            dispatch_mode = %self.options.mode,
            log_failures = self.options.log_failures,
            queue = %self.queue_name,
            worker_concurrency = self.queue.concurrency,
            "Forwarder configuration"
        );
    }
}

fn seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn positive_duration(seconds: f64) -> AnyhowResult<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(anyhow!(
            "Timeout {seconds} seconds is invalid. Must be a positive number of seconds."
        ));
    }

    Duration::try_from_secs_f64(seconds).context("timeout is out of range")
}
