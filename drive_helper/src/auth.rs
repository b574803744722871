//! Session handling: access tokens for the Drive API.
//!
//! An [`Authenticator`] is the session every `DriveClient` call runs under.
//! It either exchanges a service-account JWT for short-lived access tokens or
//! hands out a bearer token obtained elsewhere.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{DriveError, Result};
use crate::models::{ServiceAccountCredentials, TokenResponse};

/// Google OAuth2 token endpoint.
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google Drive API scope.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Refresh this long before the cached token actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

enum TokenSource {
    ServiceAccount {
        credentials: ServiceAccountCredentials,
        client: Client,
        cached_token: RwLock<Option<CachedToken>>,
    },
    Static(String),
}

/// Authenticated session handle. Cheap to clone.
#[derive(Clone)]
pub struct Authenticator {
    source: Arc<TokenSource>,
}

impl Authenticator {
    /// Create a new authenticator from a service account JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Ok(Self::new(credentials))
    }

    /// Create a new authenticator from service account credentials.
    pub fn new(credentials: ServiceAccountCredentials) -> Self {
        Self {
            source: Arc::new(TokenSource::ServiceAccount {
                credentials,
                client: Client::new(),
                cached_token: RwLock::new(None),
            }),
        }
    }

    /// Use an access token obtained from an external OAuth flow.
    ///
    /// The token is never refreshed.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            source: Arc::new(TokenSource::Static(token.into())),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        let (credentials, client, cached_token) = match self.source.as_ref() {
            TokenSource::Static(token) => {
                if token.is_empty() {
                    return Err(DriveError::AuthenticationError("empty access token".into()));
                }
                return Ok(token.clone());
            }
            TokenSource::ServiceAccount {
                credentials,
                client,
                cached_token,
            } => (credentials, client, cached_token),
        };

        {
            let cached = cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + EXPIRY_MARGIN {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = refresh_token(credentials, client).await?;

        {
            let mut cached = cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }
}

/// Exchange a signed JWT assertion for an access token.
async fn refresh_token(
    credentials: &ServiceAccountCredentials,
    client: &Client,
) -> Result<CachedToken> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| DriveError::AuthenticationError(format!("system clock error: {}", e)))?
        .as_secs();

    let token_uri = credentials.token_uri.as_deref().unwrap_or(TOKEN_URI);
    let claims = Claims {
        iss: credentials.client_email.clone(),
        scope: DRIVE_SCOPE.to_string(),
        aud: token_uri.to_string(),
        iat: now,
        exp: now + 3600, // 1 hour
    };

    let header = Header::new(Algorithm::RS256);
    let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
    let jwt = encode(&header, &claims, &key)?;

    debug!(account = %credentials.client_email, "refreshing access token");

    let params = [
        ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
        ("assertion", &jwt),
    ];

    let response = client.post(token_uri).form(&params).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::TokenRefreshError(format!(
            "Status {}: {}",
            status, body
        )));
    }

    let token_response: TokenResponse = response.json().await?;

    let expires_at = SystemTime::now() + Duration::from_secs(token_response.expires_in);

    Ok(CachedToken {
        access_token: token_response.access_token,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serialization() {
        let claims = Claims {
            iss: "test@example.iam.gserviceaccount.com".to_string(),
            scope: DRIVE_SCOPE.to_string(),
            aud: TOKEN_URI.to_string(),
            iat: 1234567890,
            exp: 1234571490,
        };

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("test@example.iam.gserviceaccount.com"));
        assert!(json.contains(DRIVE_SCOPE));
    }

    #[tokio::test]
    async fn test_static_token() {
        let auth = Authenticator::from_token("ya29.token");
        assert_eq!(auth.get_access_token().await.unwrap(), "ya29.token");
    }

    #[tokio::test]
    async fn test_empty_static_token_rejected() {
        let auth = Authenticator::from_token("");
        assert!(matches!(
            auth.get_access_token().await,
            Err(DriveError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_private_key() {
        let auth = Authenticator::new(ServiceAccountCredentials {
            client_email: "svc@example.iam.gserviceaccount.com".to_string(),
            private_key: "not a pem".to_string(),
            token_uri: None,
        });
        assert!(matches!(
            auth.get_access_token().await,
            Err(DriveError::JwtError(_))
        ));
    }
}
