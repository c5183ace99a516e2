use serde::Serialize;
use std::time::Duration;

/// Stage of the per-source run state machine, recorded on error descriptors
/// so failures can be diagnosed without re-running.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum SyncStage {
    LoadingCheckpoint,
    Fetching,
    Mapping,
    Loading,
    AdvancingCheckpoint,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncStage::LoadingCheckpoint => "loading-checkpoint",
            SyncStage::Fetching => "fetching",
            SyncStage::Mapping => "mapping",
            SyncStage::Loading => "loading",
            SyncStage::AdvancingCheckpoint => "advancing-checkpoint",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDescriptor {
    pub stage: SyncStage,
    pub record_id: Option<String>,
    pub message: String,
}

/// Outcome of one source's run. Produced fresh each run, never mutated after.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRunReport {
    pub source_id: String,
    pub records_fetched: u64,
    pub records_loaded: u64,
    pub duration: Duration,
    pub errors: Vec<ErrorDescriptor>,
    /// False when the run aborted before advancing the checkpoint
    pub completed: bool,
}

impl SyncRunReport {
    pub fn is_clean(&self) -> bool {
        self.completed && self.errors.is_empty()
    }
}

/// Aggregated reports for one full cycle across all configured sources.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub reports: Vec<SyncRunReport>,
}

impl RunSummary {
    pub fn all_completed(&self) -> bool {
        self.reports.iter().all(|r| r.completed)
    }
}
