//! Liveness handler.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use jiff::Timestamp;

use super::response::HealthResponse;
use crate::TRACING_TARGET_HANDLER;
use crate::service::ServiceState;

async fn health_status(State(state): State<ServiceState>) -> Json<HealthResponse> {
    let groups = state.dispatcher().groups();

    tracing::debug!(
        target: TRACING_TARGET_HANDLER,
        groups = groups.len(),
        "Health status check requested"
    );

    Json(HealthResponse {
        is_healthy: true,
        version: env!("CARGO_PKG_VERSION").to_owned(),
        default_group: groups.default_group().to_owned(),
        groups: groups.len(),
        queue: state.forwarder().queue_name().to_owned(),
        started_at: state.started_at(),
        updated_at: Timestamp::now(),
    })
}

/// Returns a [`Router`] with the health route.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/health", get(health_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test::create_test_server_with_router;

    #[tokio::test]
    async fn test_health_status_endpoint() -> anyhow::Result<()> {
        let server = create_test_server_with_router(|_| routes())?;

        let response = server.get("/health").await;
        response.assert_status_ok();

        let status = response.json::<HealthResponse>();
        assert!(status.is_healthy);
        assert_eq!(status.default_group, "default");
        assert_eq!(status.groups, 5);
        assert_eq!(status.queue, "default");
        assert!(status.updated_at >= status.started_at);

        Ok(())
    }
}
