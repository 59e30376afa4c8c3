//! OAuth refresh-token grant and the access-token cache.

use chrono::{DateTime, Duration, Utc};
use fiscalsheet_core::AppConfig;
use serde::Deserialize;
use tracing::{debug, info};

use crate::http::SyncError;

pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Lifetime assumed when the token endpoint does not say.
const DEFAULT_LIFETIME_SECS: i64 = 3600;

#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl OAuthCredentials {
    pub fn from_config(config: &AppConfig) -> Result<Self, SyncError> {
        let missing: Vec<&str> = [
            ("CLIENT_ID", &config.client_id),
            ("CLIENT_SECRET", &config.client_secret),
            ("REFRESH_TOKEN", &config.refresh_token),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();
        if !missing.is_empty() {
            return Err(SyncError::Auth(format!(
                "missing credentials in config: {}",
                missing.join(", ")
            )));
        }
        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Access token and its expiry. Owned by the caller and passed to each
/// Drive call, which refreshes it once it has expired.
#[derive(Debug, Default)]
pub struct CredentialCache {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a token is held and `now` has not passed its expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expires_at) {
            (Some(_), Some(expires_at)) => now <= expires_at,
            _ => false,
        }
    }

    pub fn store(&mut self, token: String, lifetime: Duration, now: DateTime<Utc>) {
        self.token = Some(token);
        self.expires_at = Some(now + lifetime);
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// A valid access token, refreshed against `token_url` if expired.
    pub async fn access_token(
        &mut self,
        client: &reqwest::Client,
        credentials: &OAuthCredentials,
        token_url: &str,
    ) -> Result<String, SyncError> {
        let now = Utc::now();
        if let Some(token) = self.token.as_ref().filter(|_| self.is_valid_at(now)) {
            debug!("using cached access token");
            return Ok(token.clone());
        }

        info!("refreshing access token");
        let resp = client
            .post(token_url)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "token refresh failed with {}: {body}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = serde_json::from_str(&resp.text().await?)?;
        let lifetime = Duration::seconds(body.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS));
        self.store(body.access_token.clone(), lifetime, now);
        info!(expires_at = ?self.expires_at, "access token refreshed");
        Ok(body.access_token)
    }
}
