pub mod checkpoint;
pub mod record;
pub mod report;

pub use checkpoint::{Checkpoint, RunStatus};
pub use record::{CellValue, SourceRecord, TargetRow};
pub use report::{ErrorDescriptor, RunSummary, SyncRunReport, SyncStage};
