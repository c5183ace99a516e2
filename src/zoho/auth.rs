use crate::config::ZohoConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::{
    AuthUrl, Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RefreshToken,
    StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse,
    },
};
use tokio::sync::RwLock;
use tracing::debug;

/// Refresh before the cached token gets this close to expiry, so requests
/// never race the identity provider's clock.
const REFRESH_MARGIN_SECS: i64 = 60;

/// An ephemeral Zoho access token. Held in process memory only; replaced,
/// never mutated, on refresh.
#[derive(Debug, Clone)]
pub struct AccessToken {
    value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: String, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    pub fn secret(&self) -> &str {
        &self.value
    }

    /// True once the remaining lifetime falls below the safety margin.
    pub fn is_expiring(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now < Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

/// The refresh-token grant against the identity provider.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn refresh(&self) -> Result<AccessToken>;
}

// Type alias for the client when Auth and Token URLs are set
type ConfiguredClient = Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Exchanges the long-lived Zoho refresh token for short-lived access tokens.
pub struct ZohoTokenExchange {
    client: ConfiguredClient,
    http_client: reqwest::Client,
    refresh_token: String,
}

impl ZohoTokenExchange {
    pub fn new(config: &ZohoConfig) -> Result<Self> {
        let client_id = ClientId::new(config.client_id.clone());
        let client_secret = ClientSecret::new(config.client_secret.clone());

        let auth_url = AuthUrl::new(format!("{}/oauth/v2/auth", config.accounts_url()))
            .map_err(|e| AppError::Auth(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(config.token_url())
            .map_err(|e| AppError::Auth(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(client_id)
            .set_client_secret(client_secret)
            .set_auth_uri(auth_url)
            .set_token_uri(token_url);

        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Auth(format!("Failed to build reqwest client: {}", e)))?;

        Ok(Self {
            client,
            http_client,
            refresh_token: config.refresh_token.clone(),
        })
    }
}

#[async_trait]
impl TokenExchange for ZohoTokenExchange {
    async fn refresh(&self) -> Result<AccessToken> {
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(self.refresh_token.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Refresh token exchange rejected: {:?}", e)))?;

        let value = token_result.access_token().secret().clone();
        let expires_in = token_result
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(3600); // Zoho omits expires_in on some data centres

        Ok(AccessToken::new(
            value,
            Utc::now() + Duration::seconds(expires_in),
        ))
    }
}

/// Caches the current access token and refreshes it proactively.
///
/// Shared read-mostly across concurrent source runs; refresh happens under
/// the write lock so concurrent callers trigger at most one exchange.
pub struct TokenManager<X: TokenExchange> {
    exchange: X,
    cached: RwLock<Option<AccessToken>>,
}

impl<X: TokenExchange> TokenManager<X> {
    pub fn new(exchange: X) -> Self {
        Self {
            exchange,
            cached: RwLock::new(None),
        }
    }

    /// Get a token valid for at least the refresh margin, exchanging the
    /// refresh token when the cache is empty or close to expiry.
    pub async fn get_valid_token(&self) -> Result<AccessToken> {
        let now = Utc::now();

        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expiring(now) {
                    return Ok(token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref() {
            if !token.is_expiring(now) {
                return Ok(token.clone());
            }
        }

        debug!("Refreshing Zoho access token");
        let token = self.exchange.refresh().await?;
        *cached = Some(token.clone());

        Ok(token)
    }

    /// Drop the cached token so the next call performs a fresh exchange.
    /// Used when the API rejects a token before its expected expiry.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.write().await;
        *cached = None;
    }
}
