use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ModelObject;

/// Caller values copied into the outcome unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeContext {
    pub doc_created: bool,
    pub doc_name: String,
}

/// Aggregate result of one upload/commit session.
///
/// Per-file failures are reported in `failure_messages`; the session itself
/// never fails because of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    pub total_count: usize,
    pub source_objects: Vec<ModelObject>,
    pub failure_messages: Vec<String>,
    pub doc_created: bool,
    pub doc_name: String,
    /// Dropped files the service did not create an attachment for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unattached_files: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl CommitOutcome {
    pub fn success_count(&self) -> usize {
        self.source_objects.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failure_messages.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failure_messages.is_empty() && self.unattached_files.is_empty()
    }
}
