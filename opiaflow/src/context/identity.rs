//! Run identity for tracking pipeline invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one call to `Pipeline::run`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunIdentity {
    /// The pipeline instance the run belongs to.
    pub pipeline_id: Uuid,
    /// The unique ID for this run.
    pub run_id: Uuid,
    /// 1-based index of the run on its pipeline instance.
    pub run_index: u64,
    /// The input reference passed to the run.
    pub input: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates a run identity with a generated run ID.
    #[must_use]
    pub fn new(pipeline_id: Uuid, run_index: u64, input: impl Into<String>) -> Self {
        Self {
            pipeline_id,
            run_id: Uuid::new_v4(),
            run_index,
            input: input.into(),
            started_at: Utc::now(),
        }
    }

    /// Converts to event data.
    #[must_use]
    pub fn to_event_data(&self) -> serde_json::Value {
        serde_json::json!({
            "pipeline_id": self.pipeline_id.to_string(),
            "run_id": self.run_id.to_string(),
            "run_index": self.run_index,
            "input": self.input,
            "started_at": self.started_at.to_rfc3339(),
        })
    }
}
