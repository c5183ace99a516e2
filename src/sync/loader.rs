use super::CancelFlag;
use super::retry::RetryPolicy;
use crate::bigquery::WarehouseOperations;
use crate::error::AppError;
use crate::mapping::SourceSpec;
use crate::models::TargetRow;
use tracing::warn;

/// A chunk ran out of retries. `loaded` counts the rows committed by the
/// chunks that succeeded before it; those stay committed (the merge is
/// idempotent, a later run re-covers them).
#[derive(Debug)]
pub struct LoadFailure {
    pub loaded: u64,
    pub error: AppError,
}

fn retryable(error: &AppError) -> bool {
    matches!(error, AppError::Load(_) | AppError::Http(_))
}

/// Write rows in bounded chunks, retrying each failed chunk with backoff
/// before giving up on the run.
pub async fn load_rows<W: WarehouseOperations + ?Sized>(
    warehouse: &W,
    spec: &SourceSpec,
    rows: &[TargetRow],
    chunk_size: usize,
    retry: RetryPolicy,
    cancel: &CancelFlag,
) -> std::result::Result<u64, LoadFailure> {
    let mut loaded = 0u64;

    for chunk in rows.chunks(chunk_size.max(1)) {
        if cancel.is_cancelled() {
            return Err(LoadFailure {
                loaded,
                error: AppError::Cancelled,
            });
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match warehouse.upsert(spec, chunk).await {
                Ok(()) => {
                    loaded += chunk.len() as u64;
                    break;
                }
                Err(error) if attempt < retry.max_attempts && retryable(&error) => {
                    warn!(
                        table = spec.table,
                        attempt,
                        %error,
                        "Chunk write failed, backing off"
                    );
                    retry.backoff(attempt).await;
                }
                Err(error) => return Err(LoadFailure { loaded, error }),
            }
        }
    }

    Ok(loaded)
}
