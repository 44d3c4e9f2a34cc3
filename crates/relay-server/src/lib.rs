#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod extract;
pub mod handler;
pub mod middleware;
pub mod service;

/// Tracing target for route handlers.
pub const TRACING_TARGET_HANDLER: &str = "relay_server::handler";

/// Tracing target for the forwarding middleware.
pub const TRACING_TARGET_MIDDLEWARE: &str = "relay_server::middleware";
