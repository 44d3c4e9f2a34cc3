//! Webhook target descriptors and their validation rules.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use url::Url;

use crate::strategy::DEFAULT_STRATEGY;
use crate::{Error, Result};

/// Default per-target timeout when neither the target nor the caller sets one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Target url reported in outcomes when a descriptor has none.
pub const UNKNOWN_TARGET: &str = "unknown";

/// HTTP methods a target may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, EnumIter, EnumString, IntoStaticStr)]
#[derive(Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

/// Raw descriptor of a single webhook target as it appears in configuration.
///
/// Fields are kept loosely typed so that a malformed target is reported as
/// an [`Error::InvalidTarget`] for that target alone instead of rejecting
/// the whole configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Absolute http(s) URL of the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// HTTP method, case-insensitive (defaults to POST).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Timeout in seconds, as a number or numeric string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Value>,

    /// Static headers; values must be scalars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,

    /// Delivery strategy identifier (defaults to `generic`).
    #[serde(default, alias = "provider", skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

impl TargetConfig {
    /// Creates a descriptor for the given url with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Parses a raw configuration value into a descriptor.
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::invalid_target(
                "Webhook target must be a mapping of settings.",
            ));
        }

        Self::deserialize(value).map_err(|e| Error::invalid_target(e.to_string()))
    }

    /// Converts the descriptor back into a configuration value.
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        if let Some(url) = &self.url {
            map.insert("url".into(), Value::String(url.clone()));
        }
        if let Some(method) = &self.method {
            map.insert("method".into(), Value::String(method.clone()));
        }
        if let Some(timeout) = &self.timeout {
            map.insert("timeout".into(), timeout.clone());
        }
        if let Some(headers) = &self.headers {
            map.insert("headers".into(), headers.clone());
        }
        if let Some(strategy) = &self.strategy {
            map.insert("strategy".into(), Value::String(strategy.clone()));
        }
        Value::Object(map)
    }

    /// Sets the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(Value::from(seconds));
        self
    }

    /// Adds a static header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut headers = match self.headers.take() {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        headers.insert(name.into(), value.into());
        self.headers = Some(Value::Object(headers));
        self
    }

    /// Sets the delivery strategy identifier.
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// Returns the configured strategy identifier, or the default one.
    pub fn strategy_id(&self) -> &str {
        self.strategy.as_deref().unwrap_or(DEFAULT_STRATEGY)
    }

    /// Returns the configured url verbatim, or `"unknown"`.
    pub fn url_or_unknown(&self) -> &str {
        self.url.as_deref().unwrap_or(UNKNOWN_TARGET)
    }

    /// Validates and parses the target url.
    ///
    /// The url must be absolute, use http or https and name a host.
    pub fn resolve_url(&self) -> Result<Url> {
        let invalid = || Error::invalid_target("Webhook target url must be a valid URL.");

        let raw = self.url.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(invalid());
        }

        let url = Url::parse(raw).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            return Err(invalid());
        }

        Ok(url)
    }

    /// Validates the HTTP method against the allowed set.
    pub fn resolve_method(&self) -> Result<HttpMethod> {
        match self.method.as_deref() {
            None => Ok(HttpMethod::default()),
            Some(method) => HttpMethod::from_str(method).map_err(|_| {
                Error::invalid_target(format!(
                    "Webhook method '{}' is not supported.",
                    method.to_uppercase()
                ))
            }),
        }
    }

    /// Resolves the timeout, falling back to `default` when unset.
    pub fn resolve_timeout(&self, default: Duration) -> Result<Duration> {
        let invalid = || Error::invalid_target("Webhook timeout must be a positive number.");

        let seconds = match &self.timeout {
            None | Some(Value::Null) => return Ok(default),
            Some(value) => numeric(value).ok_or_else(invalid)?,
        };

        if seconds <= 0.0 {
            return Err(invalid());
        }

        Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
    }

    /// Validates the static headers and renders their values as strings.
    ///
    /// With the `reqwest` feature, names and values are also checked against
    /// HTTP header syntax; otherwise that check is left to the transport.
    pub fn resolve_headers(&self) -> Result<BTreeMap<String, String>> {
        let headers = match &self.headers {
            None | Some(Value::Null) => return Ok(BTreeMap::new()),
            Some(Value::Object(headers)) => headers,
            Some(_) => {
                return Err(Error::invalid_target(
                    "Webhook headers must be a mapping of names to values.",
                ));
            }
        };

        let mut resolved = BTreeMap::new();
        for (name, value) in headers {
            if name.trim().is_empty() {
                return Err(Error::invalid_target(
                    "Webhook header names must be non-empty strings.",
                ));
            }

            let rendered = match value {
                Value::String(value) => value.clone(),
                Value::Number(value) => value.to_string(),
                Value::Bool(value) => value.to_string(),
                _ => {
                    return Err(Error::invalid_target(format!(
                        "Webhook header '{name}' must be a scalar value."
                    )));
                }
            };

            check_header_syntax(name, &rendered)?;
            resolved.insert(name.clone(), rendered);
        }

        Ok(resolved)
    }
}

#[cfg(feature = "reqwest")]
fn check_header_syntax(name: &str, value: &str) -> Result<()> {
    use reqwest::header::{HeaderName, HeaderValue};

    if HeaderName::from_bytes(name.as_bytes()).is_err() {
        return Err(Error::invalid_target(format!(
            "Webhook header name '{name}' is not a valid HTTP header name."
        )));
    }

    if HeaderValue::from_str(value).is_err() {
        return Err(Error::invalid_target(format!(
            "Webhook header '{name}' has a value that is not a valid HTTP header value."
        )));
    }

    Ok(())
}

#[cfg(not(feature = "reqwest"))]
fn check_header_syntax(_name: &str, _value: &str) -> Result<()> {
    Ok(())
}

/// Reads a number or numeric string.
pub(crate) fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    number.is_finite().then_some(number)
}

/// Extracts the url of a raw descriptor for outcome reporting.
pub(crate) fn raw_target_url(value: &Value) -> String {
    value
        .get("url")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_TARGET)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::ErrorKind;

    const DEFAULT: Duration = Duration::from_secs(DEFAULT_TIMEOUT_SECS);

    #[test]
    fn test_method_defaults_to_post() {
        let target = TargetConfig::new("https://target.test/webhook");
        assert_eq!(target.resolve_method().unwrap(), HttpMethod::Post);
    }

    #[test]
    fn test_method_allow_set() {
        for method in HttpMethod::iter() {
            let target = TargetConfig::new("https://t.test").with_method(method.as_ref());
            assert_eq!(target.resolve_method().unwrap(), method);
        }

        let target = TargetConfig::new("https://t.test").with_method("patch");
        assert_eq!(target.resolve_method().unwrap(), HttpMethod::Patch);
    }

    #[test]
    fn test_unsupported_method() {
        let target = TargetConfig::new("https://t.test").with_method("nope");
        let error = target.resolve_method().unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidTarget);
        assert!(error.to_string().contains("'NOPE' is not supported"));
    }

    #[test]
    fn test_url_validation() {
        assert!(TargetConfig::new("https://target.test/hook").resolve_url().is_ok());
        assert!(TargetConfig::new("http://127.0.0.1:8080/").resolve_url().is_ok());

        for bad in ["", "   ", "invalid-url", "/relative/path", "mailto:ops@example.com"] {
            let error = TargetConfig::new(bad).resolve_url().unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidTarget, "url {bad:?}");
        }

        let error = TargetConfig::default().resolve_url().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidTarget);
    }

    #[test]
    fn test_timeout_resolution() {
        let target = TargetConfig::new("https://t.test");
        assert_eq!(target.resolve_timeout(DEFAULT).unwrap(), DEFAULT);

        let target = target.with_timeout(2.5);
        assert_eq!(
            target.resolve_timeout(DEFAULT).unwrap(),
            Duration::from_millis(2500)
        );

        let mut target = TargetConfig::new("https://t.test");
        target.timeout = Some(json!("10"));
        assert_eq!(
            target.resolve_timeout(DEFAULT).unwrap(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_non_positive_timeout() {
        for value in [json!(0), json!(-1), json!("abc"), json!([5])] {
            let mut target = TargetConfig::new("https://t.test");
            target.timeout = Some(value.clone());

            let error = target.resolve_timeout(DEFAULT).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidTarget, "timeout {value}");
        }
    }

    #[test]
    fn test_headers_are_stringified() {
        let target = TargetConfig::new("https://t.test")
            .with_header("X-Api-Key", "abc")
            .with_header("X-Request-Id", 10)
            .with_header("X-Debug", true);

        let headers = target.resolve_headers().unwrap();
        assert_eq!(headers["X-Api-Key"], "abc");
        assert_eq!(headers["X-Request-Id"], "10");
        assert_eq!(headers["X-Debug"], "true");
    }

    #[test]
    fn test_malformed_headers() {
        let mut target = TargetConfig::new("https://t.test");
        target.headers = Some(json!("x-header: 1"));
        assert_eq!(
            target.resolve_headers().unwrap_err().kind(),
            ErrorKind::InvalidTarget
        );

        let target = TargetConfig::new("https://t.test").with_header("X-Nested", json!({"a": 1}));
        let error = target.resolve_headers().unwrap_err();
        assert!(error.to_string().contains("'X-Nested' must be a scalar"));

        let target = TargetConfig::new("https://t.test").with_header("  ", "value");
        assert_eq!(
            target.resolve_headers().unwrap_err().kind(),
            ErrorKind::InvalidTarget
        );

        let target = TargetConfig::new("https://t.test").with_header("X-Null", Value::Null);
        assert!(target.resolve_headers().is_err());
    }

    #[cfg(feature = "reqwest")]
    #[test]
    fn test_headers_must_be_valid_http() {
        let target = TargetConfig::new("https://t.test").with_header("X Bad", "value");
        let error = target.resolve_headers().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidTarget);
        assert!(error.to_string().contains("'X Bad'"));

        let target = TargetConfig::new("https://t.test").with_header("X-Split", "a\nb");
        let error = target.resolve_headers().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidTarget);
        assert!(error.to_string().contains("'X-Split'"));

        let target = TargetConfig::new("https://t.test").with_header("Content-Type", "text/plain");
        assert!(target.resolve_headers().is_ok());
    }

    #[test]
    fn test_null_headers_are_empty() {
        let mut target = TargetConfig::new("https://t.test");
        target.headers = Some(Value::Null);
        assert!(target.resolve_headers().unwrap().is_empty());
    }

    #[test]
    fn test_from_value() {
        let value = json!({
            "url": "https://discord.com/api/webhooks/test",
            "method": "POST",
            "provider": "discord",
            "timeout": 5
        });

        let target = TargetConfig::from_value(&value).unwrap();
        assert_eq!(target.strategy_id(), "discord");
        assert_eq!(target.url_or_unknown(), "https://discord.com/api/webhooks/test");

        let error = TargetConfig::from_value(&json!("https://t.test")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidTarget);

        let error = TargetConfig::from_value(&json!({"url": 42})).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidTarget);
    }

    #[test]
    fn test_value_round_trip_keeps_strategy() {
        let target = TargetConfig::new("https://t.test")
            .with_method("PUT")
            .with_strategy("discord");

        let parsed = TargetConfig::from_value(&target.to_value()).unwrap();
        assert_eq!(parsed, target);
    }

    #[test]
    fn test_raw_target_url() {
        assert_eq!(raw_target_url(&json!({"url": "https://a.test"})), "https://a.test");
        assert_eq!(raw_target_url(&json!({"method": "POST"})), UNKNOWN_TARGET);
        assert_eq!(raw_target_url(&json!(null)), UNKNOWN_TARGET);
    }
}
