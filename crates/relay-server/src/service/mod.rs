//! Application state and dependency injection.

use jiff::Timestamp;
use relay_queue::Forwarder;
use relay_webhook::Dispatcher;

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Debug, Clone)]
pub struct ServiceState {
    dispatcher: Dispatcher,
    forwarder: Forwarder,
    started_at: Timestamp,
}

impl ServiceState {
    /// Creates the state from an already wired dispatcher and forwarder.
    pub fn new(dispatcher: Dispatcher, forwarder: Forwarder) -> Self {
        Self {
            dispatcher,
            forwarder,
            started_at: Timestamp::now(),
        }
    }

    /// Returns the synchronous dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns the job forwarder.
    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    /// Returns the time the state was created.
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(dispatcher: Dispatcher);
impl_di!(forwarder: Forwarder);
