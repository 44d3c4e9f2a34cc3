//! Forwarding handlers: asynchronous enqueue and synchronous dispatch.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use relay_queue::Forwarder;
use relay_webhook::{DispatchReport, Dispatcher};

use super::response::ForwardResponse;
use crate::TRACING_TARGET_HANDLER;
use crate::extract::InboundRequest;
use crate::handler::Result;
use crate::service::ServiceState;

/// Enqueues the request for the default group.
async fn forward_default(
    State(dispatcher): State<Dispatcher>,
    State(forwarder): State<Forwarder>,
    inbound: InboundRequest,
) -> Result<(StatusCode, Json<ForwardResponse>)> {
    enqueue(&dispatcher, &forwarder, None, inbound).await
}

/// Enqueues the request for the group named in the path.
async fn forward_group(
    State(dispatcher): State<Dispatcher>,
    State(forwarder): State<Forwarder>,
    Path(group): Path<String>,
    inbound: InboundRequest,
) -> Result<(StatusCode, Json<ForwardResponse>)> {
    enqueue(&dispatcher, &forwarder, Some(&group), inbound).await
}

#[tracing::instrument(skip_all, target = TRACING_TARGET_HANDLER, fields(group = group_name))]
async fn enqueue(
    dispatcher: &Dispatcher,
    forwarder: &Forwarder,
    group_name: Option<&str>,
    inbound: InboundRequest,
) -> Result<(StatusCode, Json<ForwardResponse>)> {
    // Unresolvable groups are rejected before a job exists.
    let group = dispatcher.groups().resolve(group_name)?.name().to_owned();
    let queue = forwarder.queue_name().to_owned();

    let job_id = forwarder
        .enqueue(&inbound.url, inbound.payload, Some(&group), None)
        .await?;

    tracing::info!(
        target: TRACING_TARGET_HANDLER,
        job_id = %job_id,
        group = %group,
        queue = %queue,
        "Request enqueued for forwarding"
    );

    let response = ForwardResponse {
        job_id,
        group,
        queue,
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Dispatches the request to the default group and returns the report.
async fn dispatch_default(
    State(dispatcher): State<Dispatcher>,
    inbound: InboundRequest,
) -> Result<Json<DispatchReport>> {
    dispatch(&dispatcher, None, inbound).await
}

/// Dispatches the request to the group named in the path.
async fn dispatch_group(
    State(dispatcher): State<Dispatcher>,
    Path(group): Path<String>,
    inbound: InboundRequest,
) -> Result<Json<DispatchReport>> {
    dispatch(&dispatcher, Some(&group), inbound).await
}

async fn dispatch(
    dispatcher: &Dispatcher,
    group_name: Option<&str>,
    inbound: InboundRequest,
) -> Result<Json<DispatchReport>> {
    let report = dispatcher
        .dispatch(&inbound.url, &inbound.payload, group_name)
        .await?;

    tracing::info!(
        target: TRACING_TARGET_HANDLER,
        group = %report.group,
        sent = report.sent(),
        failed = report.failed(),
        "Request dispatched"
    );

    Ok(Json(report))
}

/// Returns a [`Router`] with the forwarding routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/forward", post(forward_default))
        .route("/forward/{group}", post(forward_group))
        .route("/dispatch", post(dispatch_default))
        .route("/dispatch/{group}", post(dispatch_group))
}
