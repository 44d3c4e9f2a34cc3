use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Answer to an enqueued forward request.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardResponse {
    /// Id of the submitted job.
    pub job_id: Uuid,
    /// Group the job will be dispatched to.
    pub group: String,
    /// Queue the job was submitted to.
    pub queue: String,
}
