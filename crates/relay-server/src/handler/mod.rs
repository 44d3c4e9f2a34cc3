//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod error;
mod forward;
mod health;
mod response;

use axum::Router;

pub use crate::handler::error::{Error, ErrorKind, Result};
pub use crate::handler::response::{ErrorResponse, ForwardResponse, HealthResponse};
use crate::service::ServiceState;

/// Returns a [`Router`] with every route, bound to `state`.
pub fn routes(state: ServiceState) -> Router {
    Router::new()
        .merge(forward::routes())
        .merge(health::routes())
        .fallback(|| async { ErrorKind::NotFound.into_error() })
        .with_state(state)
}
