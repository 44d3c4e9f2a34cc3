#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod runtime;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use relay_server::handler::routes;
use relay_server::middleware::RouterObservabilityExt;
use relay_server::service::ServiceState;

use crate::config::{Cli, ServerConfig};
use crate::runtime::Runtime;

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "relay_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "relay_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "relay_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    cli.init_tracing();
    cli.log();
    cli.validate()?;

    let settings = cli
        .forwarder
        .resolve()
        .context("failed to load forwarder configuration")?;
    settings.log();

    let runtime = Runtime::start(&cli, settings).await?;
    let router = create_router(runtime.state(), &cli.server);

    let served = server::serve(router, &cli.server, server::shutdown_signal()).await;
    runtime.shutdown(cli.server.shutdown_timeout()).await;

    served
}

/// Creates the router with all middleware layers applied.
fn create_router(state: ServiceState, config: &ServerConfig) -> Router {
    routes(state)
        .layer(DefaultBodyLimit::max(config.body_limit))
        .with_observability()
}
