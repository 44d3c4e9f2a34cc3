use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Liveness report.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub is_healthy: bool,
    pub version: String,
    /// Group used when a request names none.
    pub default_group: String,
    /// Number of configured groups.
    pub groups: usize,
    /// Queue used for forward jobs.
    pub queue: String,
    pub started_at: Timestamp,
    pub updated_at: Timestamp,
}
