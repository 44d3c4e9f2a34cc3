//! Error types for group resolution and webhook delivery.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for all webhook operations in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors that can occur while dispatching webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The requested group is not defined.
    GroupNotFound,
    /// The group does not define a `targets` list.
    InvalidGroupShape,
    /// The group defines an empty `targets` list.
    EmptyTargetList,
    /// A target descriptor violates one of its invariants.
    InvalidTarget,
    /// A target names a delivery strategy that is not registered.
    UnknownStrategy,
    /// The payload could not be encoded by the chosen strategy.
    PayloadEncoding,
    /// Network failure or timeout while sending.
    Transport,
}

impl ErrorKind {
    /// Returns `true` for errors that abort a whole dispatch call.
    ///
    /// Everything else is scoped to a single target.
    #[must_use]
    pub const fn is_group_level(&self) -> bool {
        matches!(
            self,
            Self::GroupNotFound | Self::InvalidGroupShape | Self::EmptyTargetList
        )
    }
}

/// Unified error type for webhook resolution and delivery.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Group name is absent from the registry.
    #[error("Webhook group '{group}' is not defined")]
    GroupNotFound { group: String },

    /// Group exists but `targets` is missing or not a list.
    #[error("Webhook group '{group}' must define a valid 'targets' list")]
    InvalidGroupShape { group: String },

    /// Group exists but has no targets.
    #[error("Webhook group '{group}' has no webhook targets")]
    EmptyTargetList { group: String },

    /// Target url, method, timeout or headers are invalid.
    #[error("Invalid webhook target: {reason}")]
    InvalidTarget { reason: String },

    /// No strategy is registered under the requested identifier.
    #[error("Delivery strategy '{strategy}' is not registered")]
    UnknownStrategy { strategy: String },

    /// Payload serialization failed.
    #[error("Unable to encode webhook payload: {0}")]
    PayloadEncoding(#[source] serde_json::Error),

    /// Connection failure, timeout or other transport fault.
    #[error("Webhook transport error: {message}")]
    Transport {
        message: String,
        timed_out: bool,
        #[source]
        source: Option<BoxedError>,
    },
}

impl Error {
    /// Create a group not found error
    pub fn group_not_found(group: impl Into<String>) -> Self {
        Self::GroupNotFound {
            group: group.into(),
        }
    }

    /// Create an invalid group shape error
    pub fn invalid_group_shape(group: impl Into<String>) -> Self {
        Self::InvalidGroupShape {
            group: group.into(),
        }
    }

    /// Create an empty target list error
    pub fn empty_target_list(group: impl Into<String>) -> Self {
        Self::EmptyTargetList {
            group: group.into(),
        }
    }

    /// Create an invalid target error with a human-readable reason
    pub fn invalid_target(reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            reason: reason.into(),
        }
    }

    /// Create an unknown strategy error
    pub fn unknown_strategy(strategy: impl Into<String>) -> Self {
        Self::UnknownStrategy {
            strategy: strategy.into(),
        }
    }

    /// Create a transport error without an underlying source
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: false,
            source: None,
        }
    }

    /// Create a transport error for a request that exceeded its timeout
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: true,
            source: None,
        }
    }

    /// Attaches an underlying source to a transport error.
    ///
    /// Other variants are returned unchanged.
    pub fn with_source(self, source: impl Into<BoxedError>) -> Self {
        match self {
            Self::Transport {
                message, timed_out, ..
            } => Self::Transport {
                message,
                timed_out,
                source: Some(source.into()),
            },
            other => other,
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::GroupNotFound { .. } => ErrorKind::GroupNotFound,
            Self::InvalidGroupShape { .. } => ErrorKind::InvalidGroupShape,
            Self::EmptyTargetList { .. } => ErrorKind::EmptyTargetList,
            Self::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            Self::UnknownStrategy { .. } => ErrorKind::UnknownStrategy,
            Self::PayloadEncoding(_) => ErrorKind::PayloadEncoding,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// Returns `true` when the error aborts the whole dispatch call.
    pub fn is_group_level(&self) -> bool {
        self.kind().is_group_level()
    }

    /// Returns `true` when a transport error was caused by a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { timed_out: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_group_level_classification() {
        assert!(Error::group_not_found("ghost").is_group_level());
        assert!(Error::invalid_group_shape("g").is_group_level());
        assert!(Error::empty_target_list("g").is_group_level());

        assert!(!Error::invalid_target("bad url").is_group_level());
        assert!(!Error::unknown_strategy("slack").is_group_level());
        assert!(!Error::transport("connection refused").is_group_level());
    }

    #[test]
    fn test_error_display() {
        let error = Error::group_not_found("ghost");
        assert_eq!(error.to_string(), "Webhook group 'ghost' is not defined");

        let error = Error::invalid_target("Webhook target url must be a valid URL.");
        assert!(error.to_string().contains("must be a valid URL"));
    }

    #[test]
    fn test_timeout_flag() {
        assert!(Error::timeout("deadline elapsed").is_timeout());
        assert!(!Error::transport("connection reset").is_timeout());
        assert_eq!(Error::timeout("deadline").kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_with_source_keeps_message() {
        let source = std::io::Error::other("refused");
        let error = Error::transport("Connection failed").with_source(source);

        assert!(std::error::Error::source(&error).is_some());
        assert_eq!(
            error.to_string(),
            "Webhook transport error: Connection failed"
        );
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(ErrorKind::GroupNotFound.as_ref(), "group_not_found");
        assert_eq!(ErrorKind::PayloadEncoding.to_string(), "payload_encoding");
        assert_eq!(
            ErrorKind::from_str("unknown_strategy").unwrap(),
            ErrorKind::UnknownStrategy
        );
        assert!(ErrorKind::from_str("nope").is_err());
    }
}
