//! HTTP server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Result as AnyhowResult, anyhow};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Largest accepted request body: 16 MiB.
const MAX_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// HTTP server configuration.
///
/// # Environment Variables
///
/// - `RELAY_HOST` - Server host address (default: 127.0.0.1)
/// - `RELAY_PORT` - Server port (default: 8080, valid range: 1024-65535)
/// - `RELAY_SHUTDOWN_TIMEOUT` - Graceful shutdown timeout in seconds (default: 30, max: 300)
/// - `RELAY_BODY_LIMIT` - Maximum request body size in bytes (default: 2 MiB)
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct ServerConfig {
    /// Host address to bind the server to.
    ///
    /// Use "127.0.0.1" for localhost only, "0.0.0.0" for all interfaces.
    #[arg(long, env = "RELAY_HOST", default_value = "127.0.0.1")]
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// TCP port number for the server to listen on.
    #[arg(short = 'p', long, env = "RELAY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Maximum time in seconds to wait for graceful shutdown.
    ///
    /// Covers both in-flight requests and in-flight forward attempts.
    #[arg(long, env = "RELAY_SHUTDOWN_TIMEOUT", default_value_t = 30)]
    pub shutdown_timeout: u64,

    /// Maximum request body size in bytes.
    #[arg(long, env = "RELAY_BODY_LIMIT", default_value_t = 2 * 1024 * 1024)]
    pub body_limit: usize,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

impl ServerConfig {
    /// Validates all configuration values and returns errors for invalid settings.
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.port < 1024 {
            return Err(anyhow!(
                "Port {} is below 1024. Use ports 1024-65535 to avoid requiring root privileges.",
                self.port
            ));
        }

        if self.shutdown_timeout == 0 || self.shutdown_timeout > 300 {
            return Err(anyhow!(
                "Shutdown timeout {} seconds is invalid. Must be between 1 and 300 seconds.",
                self.shutdown_timeout
            ));
        }

        if self.body_limit == 0 || self.body_limit > MAX_BODY_LIMIT {
            return Err(anyhow!(
                "Body limit {} bytes is invalid. Must be between 1 and {MAX_BODY_LIMIT} bytes.",
                self.body_limit
            ));
        }

        Ok(())
    }

    /// Returns the complete socket address for server binding.
    #[must_use]
    pub const fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns the graceful shutdown timeout as a `Duration`.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    /// Returns whether the server binds to all interfaces.
    #[must_use]
    pub const fn binds_to_all_interfaces(&self) -> bool {
        match self.host {
            IpAddr::V4(addr) => addr.is_unspecified(),
            IpAddr::V6(addr) => addr.is_unspecified(),
        }
    }

    /// Logs the server configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            host = %self.host,
            port = self.port,
            shutdown_timeout_secs = self.shutdown_timeout,
            body_limit = self.body_limit,
            "Server configuration"
        );
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 8080,
            shutdown_timeout: 30,
            body_limit: 2 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.binds_to_all_interfaces());
        assert_eq!(config.server_addr().port(), 8080);
    }

    #[test]
    fn reject_privileged_ports() {
        let config = ServerConfig {
            port: 80,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_invalid_limits() {
        let mut config = ServerConfig::default();

        config.shutdown_timeout = 0;
        assert!(config.validate().is_err());

        config.shutdown_timeout = 60;
        config.body_limit = 0;
        assert!(config.validate().is_err());

        config.body_limit = MAX_BODY_LIMIT + 1;
        assert!(config.validate().is_err());

        config.body_limit = 1024;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn detects_unspecified_host() {
        let config = ServerConfig {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ..ServerConfig::default()
        };
        assert!(config.binds_to_all_interfaces());
    }
}
