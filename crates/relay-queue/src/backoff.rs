//! Attempt limits and backoff schedules for forward jobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attempt limit used when the configured value is missing or invalid.
pub const DEFAULT_TRIES: u32 = 3;

/// Backoff schedule used when the configured value is missing or invalid.
pub const DEFAULT_BACKOFF_SECS: [u64; 3] = [5, 30, 60];

/// Delay between attempts, in whole seconds.
///
/// Serialized as either a single number or a list of numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(u64),
    /// Delay indexed by retry, the last entry repeating.
    Schedule(Vec<u64>),
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Schedule(DEFAULT_BACKOFF_SECS.to_vec())
    }
}

impl Backoff {
    /// Resolves a raw configuration value.
    ///
    /// A positive number (or numeric string) becomes a fixed delay. A
    /// non-empty list of positive numbers becomes a schedule. Anything else,
    /// including a list with a single bad entry, yields the default schedule.
    pub fn from_value(value: &Value) -> Self {
        if let Some(secs) = whole_seconds(value) {
            return if secs > 0 {
                Self::Fixed(secs.unsigned_abs())
            } else {
                Self::default()
            };
        }

        let Some(entries) = value.as_array().filter(|entries| !entries.is_empty()) else {
            return Self::default();
        };

        let schedule: Option<Vec<u64>> = entries
            .iter()
            .map(|entry| whole_seconds(entry).filter(|secs| *secs > 0).map(i64::unsigned_abs))
            .collect();

        schedule.map_or_else(Self::default, Self::Schedule)
    }

    /// Returns the delay before the retry that follows `failed_attempts`
    /// failures (1-based).
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let secs = match self {
            Self::Fixed(secs) => *secs,
            Self::Schedule(schedule) => {
                let index = (failed_attempts.max(1) - 1) as usize;
                schedule
                    .get(index)
                    .or_else(|| schedule.last())
                    .copied()
                    .unwrap_or_default()
            }
        };

        Duration::from_secs(secs)
    }
}

/// Retry settings applied to every job built by a forwarder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one; at least 1.
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_TRIES,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; zero attempts fall back to the default.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        let max_attempts = match max_attempts {
            0 => DEFAULT_TRIES,
            n => n,
        };

        Self {
            max_attempts,
            backoff,
        }
    }

    /// Resolves a policy from raw `tries` and `backoff` configuration values.
    ///
    /// Missing values use the defaults.
    pub fn from_values(tries: Option<&Value>, backoff: Option<&Value>) -> Self {
        let max_attempts = tries
            .and_then(whole_seconds)
            .filter(|tries| *tries >= 1)
            .and_then(|tries| u32::try_from(tries).ok())
            .unwrap_or(DEFAULT_TRIES);
        let backoff = backoff.map(Backoff::from_value).unwrap_or_default();

        Self {
            max_attempts,
            backoff,
        }
    }
}

/// Reads a number or numeric string, truncated toward zero.
fn whole_seconds(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(number) => number
            .as_i64()
            .map(|n| n as f64)
            .or_else(|| number.as_f64())?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    number.is_finite().then(|| number.trunc() as i64)
}
