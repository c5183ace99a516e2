use crate::error::{AppError, Result};
use crate::models::Checkpoint;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Read/write of per-source checkpoints.
///
/// Implementations must persist atomically: a reader never observes a
/// partially written checkpoint.
pub trait CheckpointStore: Send + Sync {
    fn load(&self, source_id: &str) -> Result<Option<Checkpoint>>;
    fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
}

/// One JSON file per source under the XDG state directory.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn checkpoint_path(&self, source_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", source_id))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, source_id: &str) -> Result<Option<Checkpoint>> {
        let path = self.checkpoint_path(source_id);

        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Checkpoint(format!("Failed to read {:?}: {}", path, e)))?;

        let checkpoint: Checkpoint = serde_json::from_str(&contents)
            .map_err(|e| AppError::Checkpoint(format!("Failed to parse {:?}: {}", path, e)))?;

        Ok(Some(checkpoint))
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        // last_synced_at must never move backwards, whatever the caller does
        if let Some(existing) = self.load(&checkpoint.source_id)? {
            if checkpoint.last_synced_at < existing.last_synced_at {
                return Err(AppError::Checkpoint(format!(
                    "refusing to move checkpoint for '{}' backwards ({} -> {})",
                    checkpoint.source_id, existing.last_synced_at, checkpoint.last_synced_at
                )));
            }
        }

        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::Checkpoint(format!("Failed to create state directory: {}", e))
        })?;

        let path = self.checkpoint_path(&checkpoint.source_id);
        let contents = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| AppError::Checkpoint(format!("Failed to serialize checkpoint: {}", e)))?;

        // Write-then-rename so a crash mid-write leaves the old file intact
        let tmp_path = self.dir.join(format!("{}.json.tmp", checkpoint.source_id));
        fs::write(&tmp_path, contents)
            .map_err(|e| AppError::Checkpoint(format!("Failed to write {:?}: {}", tmp_path, e)))?;
        fs::rename(&tmp_path, &path)
            .map_err(|e| AppError::Checkpoint(format!("Failed to replace {:?}: {}", path, e)))?;

        debug!(source = checkpoint.source_id, path = ?path, "Saved checkpoint");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatus;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_DIR_SEQ: AtomicU32 = AtomicU32::new(0);

    /// Store over a throwaway directory, removed when the test finishes.
    struct TempStore {
        store: FileCheckpointStore,
        dir: PathBuf,
    }

    impl std::ops::Deref for TempStore {
        type Target = FileCheckpointStore;

        fn deref(&self) -> &FileCheckpointStore {
            &self.store
        }
    }

    impl Drop for TempStore {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    fn test_store() -> TempStore {
        let dir = std::env::temp_dir().join(format!(
            "zoho-bigquery-sync-test-{}-{}",
            std::process::id(),
            TEST_DIR_SEQ.fetch_add(1, Ordering::SeqCst)
        ));
        TempStore {
            store: FileCheckpointStore::new(dir.clone()),
            dir,
        }
    }

    fn checkpoint(source_id: &str) -> Checkpoint {
        Checkpoint {
            source_id: source_id.to_string(),
            last_synced_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            last_run_status: RunStatus::Success,
            records_processed: 10,
            last_error: None,
        }
    }

    #[test]
    fn test_load_missing_returns_none() {
        let store = test_store();
        assert_eq!(store.load("leads").unwrap(), None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let store = test_store();
        let cp = checkpoint("leads");
        store.save(&cp).unwrap();
        assert_eq!(store.load("leads").unwrap(), Some(cp));
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let store = test_store();
        let mut cp = checkpoint("deals");
        store.save(&cp).unwrap();

        cp.last_synced_at += Duration::hours(1);
        cp.records_processed = 25;
        store.save(&cp).unwrap();

        assert_eq!(store.load("deals").unwrap(), Some(cp));
    }

    #[test]
    fn test_refuses_backwards_timestamp() {
        let store = test_store();
        let mut cp = checkpoint("leads");
        store.save(&cp).unwrap();

        cp.last_synced_at -= Duration::hours(1);
        let err = store.save(&cp).unwrap_err();
        assert!(matches!(err, AppError::Checkpoint(_)));

        // Original checkpoint survives the refused write
        let loaded = store.load("leads").unwrap().unwrap();
        assert_eq!(loaded.last_synced_at, checkpoint("leads").last_synced_at);
    }

    #[test]
    fn test_same_timestamp_is_allowed() {
        let store = test_store();
        let mut cp = checkpoint("leads");
        store.save(&cp).unwrap();

        cp.last_run_status = RunStatus::Failure;
        cp.last_error = Some("page 3 rate limited".to_string());
        store.save(&cp).unwrap();

        let loaded = store.load("leads").unwrap().unwrap();
        assert_eq!(loaded.last_run_status, RunStatus::Failure);
    }

    #[test]
    fn test_store_directory_is_removed_after_use() {
        let dir = {
            let store = test_store();
            store.save(&checkpoint("leads")).unwrap();
            assert!(store.dir.exists());
            store.dir.clone()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_sources_are_isolated() {
        let store = test_store();
        store.save(&checkpoint("leads")).unwrap();
        assert_eq!(store.load("deals").unwrap(), None);
    }
}
