use super::{CrmOperations, RecordPage};
use crate::config::{SyncConfig, ZohoConfig};
use crate::error::{AppError, Result};
use crate::models::SourceRecord;
use crate::sync::retry::RetryPolicy;
use crate::zoho::auth::{TokenExchange, TokenManager, ZohoTokenExchange};
use crate::zoho::types::RecordsResponse;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Bound on any single records request, so a stalled connection fails the
/// page instead of hanging the run.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// What one raw page request came back as, before any retry handling.
#[derive(Debug)]
pub enum FetchOutcome {
    Page(RecordsResponse),
    /// 204 or 304: nothing modified since the filter time
    NotModified,
    /// 401: token expired or revoked
    Unauthorized,
    /// 429: back off and retry
    RateLimited,
    Failed { status: u16, body: String },
}

/// Raw HTTP access to the Zoho records endpoint. The retry ladder in
/// `ZohoClient` sits on top of this seam.
#[async_trait]
pub trait ZohoTransport: Send + Sync {
    async fn get_records(
        &self,
        module: &str,
        token: &str,
        since: DateTime<Utc>,
        page: u32,
        per_page: u32,
    ) -> Result<FetchOutcome>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    api_base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ZohoConfig) -> Result<Self> {
        Self::with_settings(config.api_base_url(), HTTP_TIMEOUT)
    }

    fn with_settings(api_base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base_url,
        })
    }
}

#[async_trait]
impl ZohoTransport for HttpTransport {
    async fn get_records(
        &self,
        module: &str,
        token: &str,
        since: DateTime<Utc>,
        page: u32,
        per_page: u32,
    ) -> Result<FetchOutcome> {
        let url = format!("{}/{}", self.api_base_url, module);
        let since_str = since.to_rfc3339_opts(SecondsFormat::Secs, true);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .query(&[
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
                ("sort_by", "Modified_Time".to_string()),
                ("sort_order", "asc".to_string()),
                ("If-Modified-Since", since_str),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                let parsed: RecordsResponse = serde_json::from_str(&body).map_err(|e| {
                    AppError::Protocol(format!(
                        "Malformed response body for {} page {}: {}",
                        module, page, e
                    ))
                })?;
                Ok(FetchOutcome::Page(parsed))
            }
            StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED => Ok(FetchOutcome::NotModified),
            StatusCode::UNAUTHORIZED => Ok(FetchOutcome::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Ok(FetchOutcome::RateLimited),
            status => {
                let body = response.text().await.unwrap_or_default();
                Ok(FetchOutcome::Failed {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

/// Paginated fetcher: one valid token per request, one refresh+retry on a
/// 401, bounded backoff on 429, everything else a protocol error.
pub struct ZohoClient<X: TokenExchange, T: ZohoTransport> {
    token_manager: TokenManager<X>,
    transport: T,
    retry: RetryPolicy,
    page_size: u32,
}

impl ZohoClient<ZohoTokenExchange, HttpTransport> {
    pub fn new(config: &ZohoConfig, sync_config: &SyncConfig) -> Result<Self> {
        Ok(Self {
            token_manager: TokenManager::new(ZohoTokenExchange::new(config)?),
            transport: HttpTransport::new(config)?,
            retry: RetryPolicy::from_config(sync_config),
            page_size: sync_config.page_size,
        })
    }
}

impl<X: TokenExchange, T: ZohoTransport> ZohoClient<X, T> {
    pub fn with_transport(
        exchange: X,
        transport: T,
        retry: RetryPolicy,
        page_size: u32,
    ) -> Self {
        Self {
            token_manager: TokenManager::new(exchange),
            transport,
            retry,
            page_size,
        }
    }
}

#[async_trait]
impl<X: TokenExchange, T: ZohoTransport> CrmOperations for ZohoClient<X, T> {
    #[instrument(name = "Fetching page", skip_all, fields(module, page))]
    async fn fetch_page(
        &self,
        module: &str,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<RecordPage> {
        let mut auth_retried = false;
        let mut rate_attempts = 0u32;

        loop {
            let token = self.token_manager.get_valid_token().await?;
            let outcome = self
                .transport
                .get_records(module, token.secret(), since, page, self.page_size)
                .await?;

            match outcome {
                FetchOutcome::Page(response) => {
                    let more_records = response
                        .info
                        .map(|info| info.more_records)
                        .unwrap_or(false);
                    let records = response.data.into_iter().map(SourceRecord).collect();
                    return Ok(RecordPage {
                        records,
                        more_records,
                    });
                }
                FetchOutcome::NotModified => {
                    debug!(module, page, "No records modified since filter time");
                    return Ok(RecordPage {
                        records: Vec::new(),
                        more_records: false,
                    });
                }
                FetchOutcome::Unauthorized => {
                    if auth_retried {
                        return Err(AppError::Auth(format!(
                            "Token rejected again after refresh fetching {} page {}",
                            module, page
                        )));
                    }
                    debug!(module, page, "Token rejected, refreshing once");
                    auth_retried = true;
                    self.token_manager.invalidate().await;
                }
                FetchOutcome::RateLimited => {
                    rate_attempts += 1;
                    if rate_attempts >= self.retry.max_attempts {
                        return Err(AppError::RateLimit {
                            attempts: rate_attempts,
                            message: format!("fetching {} page {}", module, page),
                        });
                    }
                    warn!(module, page, attempt = rate_attempts, "Rate limited, backing off");
                    self.retry.backoff(rate_attempts).await;
                }
                FetchOutcome::Failed { status, body } => {
                    return Err(AppError::Protocol(format!(
                        "Unexpected status {} fetching {} page {}: {}",
                        status, module, page, body
                    )));
                }
            }
        }
    }
}
