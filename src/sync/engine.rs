use super::CancelFlag;
use super::loader::load_rows;
use super::retry::RetryPolicy;
use crate::bigquery::WarehouseOperations;
use crate::checkpoint::CheckpointStore;
use crate::config::SyncConfig;
use crate::error::AppError;
use crate::mapping::{SourceSpec, map_record};
use crate::models::{
    Checkpoint, ErrorDescriptor, RunStatus, RunSummary, SyncRunReport, SyncStage,
};
use crate::zoho::CrmOperations;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Lower bound for a source's very first run when the config does not pin one.
const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Drives the fetch -> map -> load -> checkpoint cycle for each source.
///
/// Rows are always written before the checkpoint advances, so a crash at any
/// point re-syncs records instead of skipping them; the warehouse merge keys
/// on record id, which makes the re-sync harmless.
pub struct SyncEngine<C, W, S> {
    config: SyncConfig,
    crm: C,
    warehouse: W,
    checkpoints: S,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C, W, S> SyncEngine<C, W, S>
where
    C: CrmOperations + Sync,
    W: WarehouseOperations + Sync,
    S: CheckpointStore,
{
    pub fn new(config: SyncConfig, crm: C, warehouse: W, checkpoints: S) -> Self {
        Self {
            config,
            crm,
            warehouse,
            checkpoints,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run every source in turn and collect the per-source reports.
    pub async fn run_all(&self, sources: &[SourceSpec], cancel: &CancelFlag) -> RunSummary {
        let mut reports = Vec::with_capacity(sources.len());
        for spec in sources {
            if cancel.is_cancelled() {
                info!("Cycle cancelled, skipping remaining sources");
                break;
            }
            reports.push(self.run_source(spec, cancel).await);
        }
        RunSummary { reports }
    }

    #[instrument(name = "Syncing source", skip_all, fields(source = spec.id))]
    pub async fn run_source(&self, spec: &SourceSpec, cancel: &CancelFlag) -> SyncRunReport {
        let started = Instant::now();
        let mut fetched = 0u64;
        let mut loaded = 0u64;
        let mut errors = Vec::new();

        // One run per source at a time; a second caller is refused, not queued
        let lock = self.source_lock(spec.id);
        let _guard = match lock.try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(source = spec.id, "Source sync already running, refusing");
                errors.push(ErrorDescriptor {
                    stage: SyncStage::LoadingCheckpoint,
                    record_id: None,
                    message: AppError::AlreadyRunning(spec.id.to_string()).to_string(),
                });
                return SyncRunReport {
                    source_id: spec.id.to_string(),
                    records_fetched: 0,
                    records_loaded: 0,
                    duration: started.elapsed(),
                    errors,
                    completed: false,
                };
            }
        };

        let prior = match self.checkpoints.load(spec.id) {
            Ok(prior) => prior,
            Err(e) => {
                error!(source = spec.id, error = %e, "Failed to load checkpoint");
                errors.push(ErrorDescriptor {
                    stage: SyncStage::LoadingCheckpoint,
                    record_id: None,
                    message: e.to_string(),
                });
                return SyncRunReport {
                    source_id: spec.id.to_string(),
                    records_fetched: 0,
                    records_loaded: 0,
                    duration: started.elapsed(),
                    errors,
                    completed: false,
                };
            }
        };

        let since = prior
            .as_ref()
            .map(|cp| cp.last_synced_at)
            .or(self.config.initial_since)
            .unwrap_or_else(|| Utc::now() - Duration::hours(DEFAULT_LOOKBACK_HOURS));
        let synced_at = Utc::now();
        info!(source = spec.id, %since, "Starting sync run");

        let outcome = self
            .run_pages(spec, since, synced_at, cancel, &mut fetched, &mut loaded, &mut errors)
            .await;

        let completed = match outcome {
            Ok(max_modified) => {
                let status = if errors.is_empty() {
                    RunStatus::Success
                } else {
                    RunStatus::Partial
                };
                // Advance to the newest modification we actually wrote; a
                // checkpoint that is already ahead stays where it is.
                let advanced = match (max_modified, prior.as_ref()) {
                    (Some(ts), Some(cp)) => cp.last_synced_at.max(ts),
                    (Some(ts), None) => ts,
                    (None, Some(cp)) => cp.last_synced_at,
                    (None, None) => since,
                };
                let checkpoint = Checkpoint {
                    source_id: spec.id.to_string(),
                    last_synced_at: advanced,
                    last_run_status: status,
                    records_processed: loaded,
                    last_error: errors.first().map(|e| e.message.clone()),
                };
                match self.checkpoints.save(&checkpoint) {
                    Ok(()) => {
                        info!(
                            source = spec.id,
                            fetched,
                            loaded,
                            checkpoint = %advanced,
                            %status,
                            "Sync run finished"
                        );
                        true
                    }
                    Err(e) => {
                        error!(source = spec.id, error = %e, "Failed to save checkpoint");
                        errors.push(ErrorDescriptor {
                            stage: SyncStage::AdvancingCheckpoint,
                            record_id: None,
                            message: e.to_string(),
                        });
                        false
                    }
                }
            }
            Err((stage, e)) => {
                error!(source = spec.id, %stage, error = %e, "Sync run failed");
                errors.push(ErrorDescriptor {
                    stage,
                    record_id: None,
                    message: e.to_string(),
                });
                // Record the failure without moving last_synced_at; a source
                // that has never completed a run keeps no checkpoint at all
                if let Some(cp) = prior.as_ref() {
                    let checkpoint = Checkpoint {
                        source_id: spec.id.to_string(),
                        last_synced_at: cp.last_synced_at,
                        last_run_status: RunStatus::Failure,
                        records_processed: loaded,
                        last_error: Some(e.to_string()),
                    };
                    if let Err(save_err) = self.checkpoints.save(&checkpoint) {
                        warn!(source = spec.id, error = %save_err, "Failed to record run failure");
                    }
                }
                false
            }
        };

        SyncRunReport {
            source_id: spec.id.to_string(),
            records_fetched: fetched,
            records_loaded: loaded,
            duration: started.elapsed(),
            errors,
            completed,
        }
    }

    /// Page loop: fetch, map (excluding invalid records), load in chunks.
    /// Returns the newest modification time among loaded rows, if any.
    #[allow(clippy::too_many_arguments)]
    async fn run_pages(
        &self,
        spec: &SourceSpec,
        since: DateTime<Utc>,
        synced_at: DateTime<Utc>,
        cancel: &CancelFlag,
        fetched: &mut u64,
        loaded: &mut u64,
        errors: &mut Vec<ErrorDescriptor>,
    ) -> std::result::Result<Option<DateTime<Utc>>, (SyncStage, AppError)> {
        self.warehouse
            .ensure_schema(spec)
            .await
            .map_err(|e| (SyncStage::Loading, e))?;

        let retry = RetryPolicy::from_config(&self.config);
        let mut max_modified: Option<DateTime<Utc>> = None;
        let mut page = 1u32;

        loop {
            if cancel.is_cancelled() {
                return Err((SyncStage::Fetching, AppError::Cancelled));
            }
            if page > self.config.max_pages {
                return Err((
                    SyncStage::Fetching,
                    AppError::Protocol(format!(
                        "pagination for module {} did not terminate within {} pages",
                        spec.zoho_module, self.config.max_pages
                    )),
                ));
            }

            let record_page = self
                .crm
                .fetch_page(spec.zoho_module, since, page)
                .await
                .map_err(|e| (SyncStage::Fetching, e))?;

            if record_page.records.is_empty() {
                break;
            }
            *fetched += record_page.records.len() as u64;

            // Invalid records are excluded individually; the rest of the
            // page still loads
            let mut rows = Vec::with_capacity(record_page.records.len());
            for record in &record_page.records {
                match map_record(spec, record, synced_at) {
                    Ok(row) => rows.push(row),
                    Err(e) => {
                        let record_id = match &e {
                            AppError::Mapping { record_id, .. } => Some(record_id.clone()),
                            _ => record.id().map(str::to_string),
                        };
                        warn!(source = spec.id, ?record_id, error = %e, "Excluding invalid record");
                        errors.push(ErrorDescriptor {
                            stage: SyncStage::Mapping,
                            record_id,
                            message: e.to_string(),
                        });
                    }
                }
            }

            match load_rows(
                &self.warehouse,
                spec,
                &rows,
                self.config.chunk_size,
                retry,
                cancel,
            )
            .await
            {
                Ok(count) => {
                    *loaded += count;
                    for row in &rows {
                        max_modified = Some(
                            max_modified.map_or(row.last_modified, |m| m.max(row.last_modified)),
                        );
                    }
                }
                Err(failure) => {
                    *loaded += failure.loaded;
                    return Err((SyncStage::Loading, failure.error));
                }
            }

            if !record_page.more_records {
                break;
            }
            page += 1;
        }

        Ok(max_modified)
    }

    fn source_lock(&self, source_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(source_id.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod mocks {
    use super::*;
    use crate::error::Result;
    use crate::models::{SourceRecord, TargetRow};
    use crate::zoho::RecordPage;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Serves fixed pages; the same pages again on a later run.
    pub struct MockCrm {
        pub pages: Vec<Vec<SourceRecord>>,
        pub calls: AtomicU32,
        pub fail_on_page: Option<u32>,
        /// Pretend the source never runs out of pages
        pub endless: bool,
    }

    impl MockCrm {
        pub fn with_pages(pages: Vec<Vec<SourceRecord>>) -> Self {
            Self {
                pages,
                calls: AtomicU32::new(0),
                fail_on_page: None,
                endless: false,
            }
        }
    }

    #[async_trait]
    impl CrmOperations for MockCrm {
        async fn fetch_page(
            &self,
            _module: &str,
            _since: DateTime<Utc>,
            page: u32,
        ) -> Result<RecordPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_page == Some(page) {
                return Err(AppError::RateLimit {
                    attempts: 3,
                    message: "injected rate limit".to_string(),
                });
            }
            let idx = (page - 1) as usize;
            if self.endless {
                return Ok(RecordPage {
                    records: self.pages.first().cloned().unwrap_or_default(),
                    more_records: true,
                });
            }
            Ok(RecordPage {
                records: self.pages.get(idx).cloned().unwrap_or_default(),
                more_records: idx + 1 < self.pages.len(),
            })
        }
    }

    /// Keyed row storage per table, like the real merge behaves.
    pub struct MockWarehouse {
        pub tables: std::sync::Mutex<HashMap<String, BTreeMap<String, TargetRow>>>,
        pub upsert_calls: AtomicU32,
        /// Every upsert call with 1-based index >= this fails
        pub fail_from_call: Option<u32>,
    }

    impl MockWarehouse {
        pub fn reliable() -> Self {
            Self {
                tables: std::sync::Mutex::new(HashMap::new()),
                upsert_calls: AtomicU32::new(0),
                fail_from_call: None,
            }
        }

        pub fn failing_from(call: u32) -> Self {
            Self {
                fail_from_call: Some(call),
                ..Self::reliable()
            }
        }

        pub fn row_count(&self, table: &str) -> usize {
            self.tables
                .lock()
                .unwrap()
                .get(table)
                .map_or(0, BTreeMap::len)
        }
    }

    #[async_trait]
    impl WarehouseOperations for MockWarehouse {
        async fn ensure_schema(&self, _spec: &SourceSpec) -> Result<()> {
            Ok(())
        }

        async fn upsert(&self, spec: &SourceSpec, rows: &[TargetRow]) -> Result<()> {
            let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(fail_from) = self.fail_from_call {
                if call >= fail_from {
                    return Err(AppError::Load("injected load failure".to_string()));
                }
            }
            let mut tables = self.tables.lock().unwrap();
            let table = tables.entry(spec.table.to_string()).or_default();
            for row in rows {
                table.insert(row.key.clone(), row.clone());
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MemoryCheckpointStore {
        pub map: std::sync::Mutex<HashMap<String, Checkpoint>>,
    }

    impl CheckpointStore for MemoryCheckpointStore {
        fn load(&self, source_id: &str) -> Result<Option<Checkpoint>> {
            Ok(self.map.lock().unwrap().get(source_id).cloned())
        }

        fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
            self.map
                .lock()
                .unwrap()
                .insert(checkpoint.source_id.clone(), checkpoint.clone());
            Ok(())
        }
    }
}
