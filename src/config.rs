use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_DIR_PREFIX: &str = "zoho-bigquery-sync";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub zoho: ZohoConfig,
    pub bigquery: BigQueryConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ZohoConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Zoho data-centre domain suffix, e.g. "com", "eu", "com.au"
    #[serde(default = "default_zoho_domain")]
    pub domain: String,
}

fn default_zoho_domain() -> String {
    "com".to_string()
}

impl ZohoConfig {
    pub fn accounts_url(&self) -> String {
        format!("https://accounts.zoho.{}", self.domain)
    }

    pub fn api_base_url(&self) -> String {
        format!("https://www.zohoapis.{}/crm/v2", self.domain)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/v2/token", self.accounts_url())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BigQueryConfig {
    pub project_id: String,
    #[serde(default = "default_dataset_id")]
    pub dataset_id: String,
    /// Path to a GCP service account key JSON file
    pub service_account_key: PathBuf,
    #[serde(default = "default_location")]
    pub location: String,
}

fn default_dataset_id() -> String {
    "zoho_crm".to_string()
}

fn default_location() -> String {
    "US".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncConfig {
    /// Records requested per Zoho page (API maximum is 200)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Upper bound on pages per run; exceeding it is treated as a protocol bug
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Rows per BigQuery merge chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Attempts for rate-limited fetches and failed warehouse chunks
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in milliseconds, doubled per attempt
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Minutes between cycles in schedule mode
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Lower bound for the first run of a source with no checkpoint.
    /// Defaults to 24 hours before the run when unset.
    #[serde(default)]
    pub initial_since: Option<DateTime<Utc>>,
}

fn default_page_size() -> u32 {
    200
}

fn default_max_pages() -> u32 {
    500
}

fn default_chunk_size() -> usize {
    500
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_interval_minutes() -> u64 {
    15
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            chunk_size: default_chunk_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            interval_minutes: default_interval_minutes(),
            initial_since: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file()?;

        if !config_path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found at {:?}. Please create one.",
                config_path
            )));
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        if config.zoho.client_id.is_empty()
            || config.zoho.client_secret.is_empty()
            || config.zoho.refresh_token.is_empty()
        {
            return Err(AppError::Config(
                "Zoho client_id, client_secret and refresh_token must be set in config file"
                    .to_string(),
            ));
        }

        if config.bigquery.project_id.is_empty() {
            return Err(AppError::Config(
                "BigQuery project_id must be set in config file".to_string(),
            ));
        }

        if config.sync.page_size == 0 || config.sync.page_size > 200 {
            return Err(AppError::Config(
                "sync.page_size must be between 1 and 200".to_string(),
            ));
        }

        if config.sync.chunk_size == 0 {
            return Err(AppError::Config(
                "sync.chunk_size must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        let xdg_dirs = Self::xdg_dirs();
        xdg_dirs
            .place_config_file("config.toml")
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))
    }

    /// Get the directory holding per-source checkpoint files
    pub fn state_dir() -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.get_state_home()
            .ok_or_else(|| AppError::Config("Failed to determine state directory".to_string()))
    }
}
