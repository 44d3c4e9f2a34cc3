//! Reqwest-based HTTP transport for webhook delivery.
//!
//! This module provides the production implementation of the
//! [`WebhookTransport`](crate::WebhookTransport) trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relay_webhook::reqwest::{ReqwestClient, ReqwestConfig};
//! use relay_webhook::StrategyRegistry;
//!
//! let client = ReqwestClient::new(ReqwestConfig::default())?;
//! let strategies = StrategyRegistry::builtin(Arc::new(client), Duration::from_secs(30));
//! ```

mod client;
mod config;
mod error;

pub use client::ReqwestClient;
pub use config::{DEFAULT_CONNECT_TIMEOUT_SECS, ReqwestConfig};
pub use error::{Error, Result};

/// Tracing target for reqwest client operations.
pub const TRACING_TARGET: &str = "relay_webhook::reqwest";
