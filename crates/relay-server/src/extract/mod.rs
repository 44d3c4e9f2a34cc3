//! Request extractors.

mod inbound;

pub use inbound::{InboundRequest, QUERY_KEY};
pub(crate) use inbound::read_body;
