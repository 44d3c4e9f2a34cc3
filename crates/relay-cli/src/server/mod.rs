//! HTTP server startup and lifecycle management.

mod shutdown;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

pub use self::shutdown::shutdown_signal;
use crate::config::ServerConfig;
use crate::{TRACING_TARGET_SERVER_SHUTDOWN, TRACING_TARGET_SERVER_STARTUP};

/// Binds to the configured address and serves `app` until `signal` resolves.
///
/// In-flight requests get up to the configured shutdown timeout to finish.
pub async fn serve(
    app: Router,
    config: &ServerConfig,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let server_addr = config.server_addr();
    let listener = TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("failed to bind to {server_addr}"))?;

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %server_addr,
        "Server is ready and listening for connections"
    );

    if config.binds_to_all_interfaces() {
        tracing::warn!(
            target: TRACING_TARGET_SERVER_STARTUP,
            "Server bound to all interfaces (0.0.0.0) - ensure firewall is configured"
        );
    }

    let start_time = Instant::now();
    let shutdown_timeout = config.shutdown_timeout();
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();

    let server = async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            signal.await;
            let _ = signalled_tx.send(());
        })
        .await
    };

    tokio::select! {
        result = server => result.context("server encountered an error")?,
        () = drain_deadline(signalled_rx, shutdown_timeout) => {
            tracing::warn!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                timeout_secs = shutdown_timeout.as_secs(),
                "In-flight requests did not finish in time"
            );
        }
    }

    tracing::info!(
        target: TRACING_TARGET_SERVER_SHUTDOWN,
        uptime_secs = start_time.elapsed().as_secs(),
        "Server shut down"
    );

    Ok(())
}

/// Resolves `timeout` after the shutdown signal fired; never resolves otherwise.
async fn drain_deadline(
    signalled: tokio::sync::oneshot::Receiver<()>,
    timeout: std::time::Duration,
) {
    if signalled.await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(timeout).await;
}
