use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Zoho authentication error: {0}")]
    Auth(String),

    #[error("Zoho rate limit exceeded after {attempts} attempts: {message}")]
    RateLimit { attempts: u32, message: String },

    #[error("Zoho protocol error: {0}")]
    Protocol(String),

    #[error("Failed to map record {record_id} field '{field}': {message}")]
    Mapping {
        record_id: String,
        field: String,
        message: String,
    },

    #[error("BigQuery load error: {0}")]
    Load(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Sync for source '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
