//! Error types for reqwest-based webhook delivery.

use thiserror::Error;

/// Result type alias for reqwest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for reqwest operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Reqwest(e) => {
                if e.is_timeout() {
                    crate::Error::timeout(e.to_string()).with_source(e)
                } else if e.is_connect() {
                    crate::Error::transport("Connection failed").with_source(e)
                } else if e.is_builder() {
                    crate::Error::invalid_target(e.to_string())
                } else {
                    crate::Error::transport(e.to_string()).with_source(e)
                }
            }
            Error::Serde(e) => crate::Error::PayloadEncoding(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_serde_maps_to_payload_encoding() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: crate::Error = Error::Serde(source).into();
        assert_eq!(error.kind(), ErrorKind::PayloadEncoding);
    }
}
