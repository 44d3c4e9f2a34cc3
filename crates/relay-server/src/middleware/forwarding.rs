//! Middleware forwarding every request it sees to a webhook group.

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};

use crate::TRACING_TARGET_MIDDLEWARE;
use crate::extract::{InboundRequest, read_body};
use crate::service::ServiceState;

/// State of the forwarding middleware.
#[derive(Debug, Clone)]
pub struct ForwardingState {
    service: ServiceState,
    group: Option<String>,
    queue: Option<String>,
}

impl ForwardingState {
    /// Forwards to the default group on the forwarder's queue.
    pub fn new(service: ServiceState) -> Self {
        Self {
            service,
            group: None,
            queue: None,
        }
    }

    /// Forwards to `group` instead of the default group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Submits jobs to `queue` instead of the forwarder's queue.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }
}

/// Extension trait for `axum::`[`Router`] to forward served requests.
pub trait RouterForwardingExt<S> {
    /// Layers the forwarding middleware over every route of the router.
    fn with_forwarding(self, state: ForwardingState) -> Self;
}

impl<S> RouterForwardingExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_forwarding(self, state: ForwardingState) -> Self {
        self.layer(from_fn_with_state(state, forward_request))
    }
}

/// Captures the request, runs the inner service and enqueues a forward job.
///
/// The group is resolved before the inner service runs, so a request for
/// an unknown or misconfigured group is answered with the matching error
/// and never reaches the handler. Enqueue failures are logged and do not
/// alter the inner response.
pub async fn forward_request(
    State(state): State<ForwardingState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let body = match read_body(Request::from_parts(parts.clone(), body), &()).await {
        Ok(body) => body,
        Err(error) => return error.into_response(),
    };

    let inbound = match InboundRequest::capture(&parts, &body) {
        Ok(inbound) => Some(inbound),
        Err(error) => {
            tracing::warn!(
                target: TRACING_TARGET_MIDDLEWARE,
                method = %parts.method,
                path = %parts.uri.path(),
                error = %error,
                "Request body cannot be forwarded"
            );
            None
        }
    };

    let group = match state.service.dispatcher().groups().resolve(state.group.as_deref()) {
        Ok(group) => group.name().to_owned(),
        Err(error) => return crate::handler::Error::from(error).into_response(),
    };

    let response = next.run(Request::from_parts(parts, Body::from(body))).await;

    if let Some(inbound) = inbound {
        let enqueued = state
            .service
            .forwarder()
            .enqueue(
                &inbound.url,
                inbound.payload,
                Some(&group),
                state.queue.as_deref(),
            )
            .await;

        match enqueued {
            Ok(job_id) => tracing::debug!(
                target: TRACING_TARGET_MIDDLEWARE,
                job_id = %job_id,
                group = %group,
                url = %inbound.url,
                "Request forwarded"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET_MIDDLEWARE,
                group = %group,
                url = %inbound.url,
                error = %error,
                "Failed to forward request"
            ),
        }
    }

    response
}
