//! Response bodies returned by the handlers.

mod error_response;
mod forward;
mod health;

pub use error_response::ErrorResponse;
pub use forward::ForwardResponse;
pub use health::HealthResponse;
