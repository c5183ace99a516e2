use crate::error::{AppError, Result};
use hyper_util::client::legacy::connect::HttpConnector;
use std::path::Path;
use yup_oauth2::{
    ServiceAccountAuthenticator, authenticator::Authenticator, hyper_rustls::HttpsConnector,
};

const BIGQUERY_SCOPES: &[&str] = &["https://www.googleapis.com/auth/bigquery"];

type AuthType = Authenticator<HttpsConnector<HttpConnector>>;

/// Google Cloud service-account token source for the BigQuery REST API.
pub(super) struct GcpAuth {
    authenticator: AuthType,
}

impl GcpAuth {
    /// Build the authenticator from a service-account key file and verify it
    /// by fetching an initial token.
    pub(super) async fn new(key_path: &Path) -> Result<Self> {
        let key = yup_oauth2::read_service_account_key(key_path)
            .await
            .map_err(|e| {
                AppError::Auth(format!(
                    "Failed to read service account key {:?}: {}",
                    key_path, e
                ))
            })?;

        let authenticator = ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|e| AppError::Auth(format!("Failed to build GCP authenticator: {}", e)))?;

        let auth = Self { authenticator };
        auth.bearer_token().await?;

        Ok(auth)
    }

    pub(super) async fn bearer_token(&self) -> Result<String> {
        let token = self
            .authenticator
            .token(BIGQUERY_SCOPES)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to get GCP token: {}", e)))?;

        token
            .token()
            .map(|t| t.to_string())
            .ok_or_else(|| AppError::Auth("GCP token response contained no token".to_string()))
    }
}
