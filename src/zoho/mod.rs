mod auth;
mod client;
pub mod types;

pub use auth::{AccessToken, TokenExchange, TokenManager, ZohoTokenExchange};
pub use client::{FetchOutcome, HttpTransport, ZohoClient, ZohoTransport};

use crate::error::Result;
use crate::models::SourceRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One page of records plus whether the source reports more pages.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPage {
    pub records: Vec<SourceRecord>,
    pub more_records: bool,
}

#[async_trait]
pub trait CrmOperations {
    /// Fetch one page (1-based) of records modified at or after `since`,
    /// in the module's deterministic Modified_Time-ascending order.
    async fn fetch_page(
        &self,
        module: &str,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<RecordPage>;
}
