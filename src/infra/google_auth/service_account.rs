// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// Turns a Google Cloud service-account key file into OAuth2 access tokens
// using the JWT bearer flow:
//
// 1. Build a JWT claiming the service account email as issuer and the
//    requested scope, signed RS256 with the key's private key.
// 2. POST it to the key's `token_uri` with
//    `grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer`.
// 3. Use the returned access token as a Bearer token until shortly before
//    it expires.
//
// The key file itself comes from the user's upload (see
// `core::storage::StorageCredentials`); nothing is read from the environment.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::core::storage::StorageError;

/// Read-only access to Cloud Storage objects.
pub const STORAGE_READ_ONLY_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_only";

/// Tokens are refreshed this long before Google says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// The service account email (used as issuer in JWT).
    client_email: String,

    /// The private key in PEM format.
    private_key: String,

    /// The token URI (where to exchange JWT for access token).
    token_uri: String,
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    /// Max 1 hour after `iat`.
    exp: u64,
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Cached access token with expiration.
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// Authenticator that handles OAuth2 with service account credentials.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    scope: String,
    client: Client,
    cached_token: RwLock<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// Creates a new authenticator from a JSON key file path.
    pub async fn from_file(path: &Path, scope: &str, client: Client) -> Result<Self, StorageError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content, scope, client)
    }

    /// Creates a new authenticator from JSON content.
    pub fn from_json(json: &str, scope: &str, client: Client) -> Result<Self, StorageError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)
            .map_err(|e| StorageError::InvalidCredentials(e.to_string()))?;
        Ok(Self {
            credentials,
            scope: scope.to_string(),
            client,
            cached_token: RwLock::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    /// Gets a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String, StorageError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() {
                    return Ok(token.token.clone());
                }
            }
        }

        let response = self.fetch_new_token().await?;
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);

        let mut cached = self.cached_token.write().await;
        *cached = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at: SystemTime::now() + lifetime,
        });

        tracing::debug!(
            client_email = %self.credentials.client_email,
            "Fetched new access token"
        );
        Ok(response.access_token)
    }

    /// Signs the JWT assertion for the token exchange.
    fn signed_assertion(&self, now: u64) -> Result<String, StorageError> {
        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| StorageError::InvalidCredentials(format!("unusable private key: {}", e)))?;
        encode(&header, &claims, &key).map_err(|e| StorageError::Auth(e.to_string()))
    }

    /// Fetches a new access token from Google.
    async fn fetch_new_token(&self) -> Result<TokenResponse, StorageError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StorageError::Auth(e.to_string()))?
            .as_secs();
        let jwt = self.signed_assertion(now)?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StorageError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!(
                "Token exchange failed ({}): {}",
                status, text
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| StorageError::Auth(e.to_string()))
    }
}
