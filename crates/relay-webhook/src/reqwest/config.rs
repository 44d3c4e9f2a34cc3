//! Reqwest client configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

/// Default connect timeout for outbound requests: 10 seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the reqwest HTTP client.
///
/// Per-request timeouts come from each target; this only covers
/// connection-level settings shared by every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ReqwestConfig {
    /// TCP connect timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(
            long = "http-connect-timeout",
            env = "RELAY_HTTP_CONNECT_TIMEOUT",
            default_value = "10"
        )
    )]
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout: u64,

    /// User-Agent header to send with requests
    #[cfg_attr(
        feature = "config",
        arg(long = "http-user-agent", env = "RELAY_HTTP_USER_AGENT")
    )]
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Default for ReqwestConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout_secs(),
            user_agent: None,
        }
    }
}

impl ReqwestConfig {
    /// Returns the effective connect timeout, using the default if zero.
    pub fn effective_connect_timeout(&self) -> Duration {
        match self.connect_timeout {
            0 => Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    /// Returns the effective user agent, using the default if not set.
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("relay/{}", env!("CARGO_PKG_VERSION")))
    }

    /// Set the connect timeout in seconds.
    #[must_use]
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout = secs;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReqwestConfig::default();
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert!(config.user_agent.is_none());
        assert!(config.effective_user_agent().starts_with("relay/"));
    }

    #[test]
    fn test_zero_connect_timeout_uses_default() {
        let config = ReqwestConfig::default().with_connect_timeout(0);
        assert_eq!(config.effective_connect_timeout(), Duration::from_secs(10));

        let config = config.with_connect_timeout(3);
        assert_eq!(config.effective_connect_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_custom_user_agent() {
        let config = ReqwestConfig::default().with_user_agent("hooks/2.0");
        assert_eq!(config.effective_user_agent(), "hooks/2.0");
    }
}
