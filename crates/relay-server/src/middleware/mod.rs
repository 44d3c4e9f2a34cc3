//! Router middleware: request forwarding and observability.

mod forwarding;
mod observability;

pub use forwarding::{ForwardingState, RouterForwardingExt, forward_request};
pub use observability::RouterObservabilityExt;
