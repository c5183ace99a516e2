mod auth;
mod client;
pub mod schema;

pub use client::BigQueryClient;

use crate::error::Result;
use crate::mapping::SourceSpec;
use crate::models::TargetRow;
use async_trait::async_trait;

#[async_trait]
pub trait WarehouseOperations: Send + Sync {
    /// Create the dataset/table if absent and add any missing columns.
    /// Additive only: existing columns are never dropped or retyped.
    async fn ensure_schema(&self, spec: &SourceSpec) -> Result<()>;

    /// Merge one chunk of rows keyed on the spec's key column: matched keys
    /// have their non-key columns replaced, new keys are inserted.
    /// Re-applying an identical chunk leaves the table unchanged.
    async fn upsert(&self, spec: &SourceSpec, rows: &[TargetRow]) -> Result<()>;
}
