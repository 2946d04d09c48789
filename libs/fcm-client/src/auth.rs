use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::{FCMError, Result};
use crate::models::{GoogleTokenResponse, JwtClaims, ServiceAccountKey, TokenCache};

/// OAuth2 scope for the FCM v1 API
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Source of bearer tokens for the v1 endpoint
///
/// Implementations must return a token that is valid for the next request;
/// how and when they refresh is up to them.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

pub type DynTokenProvider = Arc<dyn TokenProvider>;

/// Fixed token, for tests and for callers that manage tokens themselves
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Mints access tokens from a Google service account and caches them
/// until shortly before expiry.
pub struct ServiceAccountTokenProvider {
    credentials: Arc<ServiceAccountKey>,
    token_cache: Mutex<Option<TokenCache>>,
    http_client: reqwest::Client,
}

impl ServiceAccountTokenProvider {
    pub fn new(credentials: ServiceAccountKey) -> Self {
        Self::with_http_client(credentials, reqwest::Client::new())
    }

    pub fn with_http_client(credentials: ServiceAccountKey, http_client: reqwest::Client) -> Self {
        Self {
            credentials: Arc::new(credentials),
            token_cache: Mutex::new(None),
            http_client,
        }
    }

    /// Read a service account JSON key from any byte stream
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let credentials: ServiceAccountKey = serde_json::from_reader(reader)
            .map_err(|e| FCMError::Credentials(e.to_string()))?;
        Ok(Self::new(credentials))
    }

    /// Read a service account JSON key file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| FCMError::Credentials(format!("{}: {}", path.display(), e)))?;
        Self::from_reader(file)
    }

    /// Send token requests through an existing (pooled) client
    pub fn with_shared_client(self, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            ..self
        }
    }

    pub fn project_id(&self) -> &str {
        &self.credentials.project_id
    }

    fn signed_assertion(&self) -> Result<String> {
        let now = Utc::now();
        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            sub: self.credentials.client_email.clone(),
            scope: FCM_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };

        let encoding_key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| FCMError::KeyParse(e.to_string()))?;

        let mut header = Header::new(Algorithm::RS256);
        if !self.credentials.private_key_id.is_empty() {
            header.kid = Some(self.credentials.private_key_id.clone());
        }

        encode(&header, &claims, &encoding_key).map_err(|e| FCMError::JwtEncode(e.to_string()))
    }

    async fn fetch_token(&self) -> Result<TokenCache> {
        let assertion = self.signed_assertion()?;
        self.exchange_assertion(&assertion).await
    }

    /// JWT-bearer grant against the key's `token_uri`
    async fn exchange_assertion(&self, assertion: &str) -> Result<TokenCache> {
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion),
        ];

        let response = self
            .http_client
            .post(&self.credentials.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| FCMError::Token(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FCMError::TokenRequestFailed(status.as_u16(), error_text));
        }

        let token_response: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| FCMError::Token(format!("failed to parse token response: {}", e)))?;

        Ok(TokenCache {
            access_token: token_response.access_token,
            expires_at: Utc::now().timestamp() + token_response.expires_in,
        })
    }
}

#[async_trait::async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<String> {
        // Held across the refresh so concurrent callers wait for one fetch
        let mut cache = self.token_cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(Utc::now().timestamp()) {
                debug!("Using cached FCM access token");
                return Ok(cached.access_token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        info!(
            "Fetched FCM access token for {} (expires_at={})",
            self.credentials.client_email, fresh.expires_at
        );
        let token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}
