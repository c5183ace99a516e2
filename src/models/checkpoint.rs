use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted sync progress for one source.
///
/// `last_synced_at` is monotonically non-decreasing across runs and is only
/// advanced after the corresponding rows have been committed to the
/// warehouse. Failed runs update the status fields but leave it untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub source_id: String,
    pub last_synced_at: DateTime<Utc>,
    pub last_run_status: RunStatus,
    pub records_processed: u64,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure,
    /// Run completed but some records were excluded by mapping errors
    Partial,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failure => write!(f, "failure"),
            RunStatus::Partial => write!(f, "partial"),
        }
    }
}
