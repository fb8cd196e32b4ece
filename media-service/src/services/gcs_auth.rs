use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use tokio::sync::Mutex;

const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before Google says they expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Fields of a service-account JSON key used for the JWT bearer grant.
#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: Secret<String>,
    #[serde(default)]
    private_key_id: Option<String>,
    token_uri: String,
}

/// Claims of the signed assertion exchanged for an access token
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    /// Issuer (service account email)
    iss: &'a str,
    scope: &'a str,
    /// Audience (token endpoint)
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: Secret<String>,
    expires_at: DateTime<Utc>,
}

/// OAuth2 access tokens for Cloud Storage, minted from a service-account key
/// and cached until shortly before expiry.
pub struct ServiceAccountAuth {
    http: Client,
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub async fn from_file(path: &str, http: Client) -> Result<Self, AppError> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to read service account key from {}: {}",
                path,
                e
            ))
        })?;
        Self::from_json(&json, http)
    }

    pub fn from_json(json: &str, http: Client) -> Result<Self, AppError> {
        let key: ServiceAccountKey = serde_json::from_str(json).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid service account key: {}", e))
        })?;

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to parse private key: {}", e))
            })?;

        tracing::info!(client_email = %key.client_email, "GCS service account loaded");

        Ok(Self {
            http,
            client_email: key.client_email,
            key_id: key.private_key_id,
            token_uri: key.token_uri,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: STORAGE_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("Failed to sign assertion: {}", e)))
    }

    /// Returns a valid bearer token, exchanging a new assertion when the
    /// cached one is missing or about to expire.
    pub async fn access_token(&self) -> Result<String, AppError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if token.expires_at > now {
                return Ok(token.value.expose_secret().clone());
            }
        }

        let assertion = self.sign_assertion(now)?;
        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "GCS token exchange rejected");
            return Err(AppError::StorageError(anyhow::anyhow!(
                "Token endpoint returned HTTP {}",
                status
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AppError::StorageError(anyhow::anyhow!("Unreadable token response: {}", e))
        })?;

        let lifetime = (token.expires_in - EXPIRY_MARGIN_SECS).max(0);
        *cached = Some(CachedToken {
            value: Secret::new(token.access_token.clone()),
            expires_at: now + Duration::seconds(lifetime),
        });
        tracing::debug!(expires_in = token.expires_in, "GCS access token refreshed");

        Ok(token.access_token)
    }
}
