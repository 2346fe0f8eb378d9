/// Bearer tokens for the remote store.
///
/// The Drive client only sees [`TokenProvider`]. The shipped provider keeps
/// an OAuth refresh token in the local store and exchanges it for
/// short-lived access tokens, caching the current one in memory.
use std::sync::Arc;

use async_trait::async_trait;
use kanbanx_core::engine::now_ms;
use kanbanx_core::storage::{KeyValueStore, StoreError, DRIVE_CREDENTIALS_KEY};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::DriveConfig;

/// Access tokens are treated as expired this long before Google says so.
const EXPIRY_MARGIN_MS: i64 = 60_000;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Google OAuth client ID missing; set drive.clientId in the config file")]
    NotConfigured,

    #[error("Drive authorization required; sign in first")]
    ConsentRequired,

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Credential storage failed: {0}")]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A bearer token. `interactive` allows re-authorizing from scratch
    /// instead of reusing a cached token.
    async fn get_token(&self, interactive: bool) -> Result<String, AuthError>;

    /// Forget a token the server rejected.
    async fn invalidate(&self, token: &str);

    /// Forget every cached token and stored credential (sign out).
    async fn clear_all(&self);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredentials {
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

pub struct OAuthTokenProvider {
    config: DriveConfig,
    store: Arc<dyn KeyValueStore>,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl OAuthTokenProvider {
    pub fn new(config: DriveConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config,
            store,
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Persist a refresh token obtained out of band.
    pub async fn save_credentials(&self, refresh_token: &str) -> Result<(), AuthError> {
        let credentials = StoredCredentials {
            refresh_token: refresh_token.trim().to_string(),
        };
        let value = serde_json::to_value(&credentials).map_err(StoreError::from)?;
        self.store.set(DRIVE_CREDENTIALS_KEY, value).await?;
        *self.cached.lock().await = None;
        log::info!(target: "kanbanx.auth", "Stored Drive credentials");
        Ok(())
    }

    async fn load_credentials(&self) -> Result<Option<StoredCredentials>, AuthError> {
        match self.store.get(DRIVE_CREDENTIALS_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value).ok()),
            None => Ok(None),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CachedToken, AuthError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let resp = self
            .http
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::Refresh(format!("{}: {}", status, text)));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let tokens: TokenResponse = resp.json().await?;
        Ok(CachedToken {
            access_token: tokens.access_token,
            expires_at: now_ms() + tokens.expires_in * 1000,
        })
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn get_token(&self, interactive: bool) -> Result<String, AuthError> {
        if !self.config.is_configured() {
            return Err(AuthError::NotConfigured);
        }

        let mut cached = self.cached.lock().await;
        if !interactive {
            if let Some(token) = cached.as_ref() {
                if token.expires_at - EXPIRY_MARGIN_MS > now_ms() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let credentials = self
            .load_credentials()
            .await?
            .ok_or(AuthError::ConsentRequired)?;
        let fresh = self.refresh(&credentials.refresh_token).await?;
        if interactive {
            log::info!(target: "kanbanx.auth", "Drive token acquired");
        }
        let token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn invalidate(&self, token: &str) {
        let mut cached = self.cached.lock().await;
        if cached.as_ref().is_some_and(|c| c.access_token == token) {
            *cached = None;
        }
    }

    async fn clear_all(&self) {
        *self.cached.lock().await = None;
        if let Err(e) = self.store.remove(DRIVE_CREDENTIALS_KEY).await {
            log::warn!(target: "kanbanx.auth", "Unable to clear Drive credentials: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanbanx_core::storage::memory::MemoryStore;

    fn configured() -> DriveConfig {
        DriveConfig {
            client_id: "123.apps.googleusercontent.com".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_placeholder_client_id_is_not_configured() {
        let provider = OAuthTokenProvider::new(DriveConfig::default(), Arc::new(MemoryStore::new()));
        assert!(matches!(provider.get_token(false).await, Err(AuthError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_missing_credentials_require_consent() {
        let provider = OAuthTokenProvider::new(configured(), Arc::new(MemoryStore::new()));
        assert!(matches!(provider.get_token(true).await, Err(AuthError::ConsentRequired)));
    }

    #[tokio::test]
    async fn test_cached_token_is_reused_until_invalidated() {
        let provider = OAuthTokenProvider::new(configured(), Arc::new(MemoryStore::new()));
        *provider.cached.lock().await = Some(CachedToken {
            access_token: "tok".into(),
            expires_at: now_ms() + 3_600_000,
        });
        assert_eq!(provider.get_token(false).await.unwrap(), "tok");

        provider.invalidate("other").await;
        assert_eq!(provider.get_token(false).await.unwrap(), "tok");

        provider.invalidate("tok").await;
        assert!(matches!(provider.get_token(false).await, Err(AuthError::ConsentRequired)));
    }

    #[tokio::test]
    async fn test_clear_all_forgets_credentials() {
        let store = Arc::new(MemoryStore::new());
        let provider = OAuthTokenProvider::new(configured(), store.clone());
        provider.save_credentials(" refresh ").await.unwrap();
        let stored = store.get(DRIVE_CREDENTIALS_KEY).await.unwrap().unwrap();
        assert_eq!(stored["refreshToken"], "refresh");

        provider.clear_all().await;
        assert!(store.get(DRIVE_CREDENTIALS_KEY).await.unwrap().is_none());
    }
}
