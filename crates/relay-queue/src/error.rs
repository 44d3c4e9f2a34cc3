//! Error types for job submission and execution.

/// Result type for all queue operations in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Dispatch failed at group level; counts as a failed attempt.
    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] relay_webhook::Error),

    /// The queue no longer accepts jobs.
    #[error("Queue '{queue}' is closed")]
    QueueClosed { queue: String },

    /// Job (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Queue backend operation failed.
    #[error("Queue operation '{operation}' failed: {reason}")]
    Operation { operation: String, reason: String },
}

impl Error {
    /// Create a queue closed error
    pub fn queue_closed(queue: impl Into<String>) -> Self {
        Self::QueueClosed {
            queue: queue.into(),
        }
    }

    /// Create a backend operation error
    pub fn operation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Operation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Returns the underlying dispatch error, if any.
    pub fn as_dispatch(&self) -> Option<&relay_webhook::Error> {
        match self {
            Self::Dispatch(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_is_wrapped() {
        let error: Error = relay_webhook::Error::group_not_found("ghost").into();
        assert!(error.as_dispatch().is_some_and(|e| e.is_group_level()));
        assert!(error.to_string().contains("'ghost'"));
    }

    #[test]
    fn test_operation_display() {
        let error = Error::operation("stream_create", "timed out");
        assert_eq!(
            error.to_string(),
            "Queue operation 'stream_create' failed: timed out"
        );
        assert!(error.as_dispatch().is_none());
    }
}
