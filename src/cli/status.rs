use crate::checkpoint::{CheckpointStore, FileCheckpointStore};
use crate::config::Config;
use crate::error::Result;
use crate::sources;
use tracing::info;

pub async fn execute() -> Result<()> {
    let store = FileCheckpointStore::new(Config::state_dir()?);

    for spec in sources::all_sources() {
        match store.load(spec.id)? {
            Some(cp) => info!(
                source = spec.id,
                table = spec.table,
                last_synced_at = %cp.last_synced_at,
                status = %cp.last_run_status,
                records = cp.records_processed,
                last_error = ?cp.last_error,
                "Checkpoint"
            ),
            None => info!(source = spec.id, table = spec.table, "Never synced"),
        }
    }

    Ok(())
}
