//! Access token lifecycle
//!
//! Read-through cache of the account access token: the configured
//! [`CacheStore`] is consulted first, and only on a miss (or when forced) is a
//! new token fetched from the platform and written back.

use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::{Api, Endpoints};
use crate::cache::CacheStore;
use crate::error::{Result, WechatError};
use crate::http::HttpClient;

/// Cache key of the access token
pub const ACCESS_TOKEN_KEY: &str = "wechat.access_token";

/// Lifetime assumed when the platform omits `expires_in`
const DEFAULT_EXPIRES_IN: u64 = 7200;

/// Token response from `token.get`
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Access token manager
#[derive(Clone)]
pub struct AccessToken {
    app_id: String,
    secret: String,
    endpoints: Endpoints,
    http: HttpClient,
    store: Arc<RwLock<Arc<dyn CacheStore>>>,
}

impl AccessToken {
    pub fn new(
        app_id: impl Into<String>,
        secret: impl Into<String>,
        endpoints: Endpoints,
        http: HttpClient,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            secret: secret.into(),
            endpoints,
            http,
            store: Arc::new(RwLock::new(store)),
        }
    }

    /// Swap the cache store
    pub fn set_store(&self, store: Arc<dyn CacheStore>) {
        *self.store.write() = store;
    }

    pub fn store(&self) -> Arc<dyn CacheStore> {
        self.store.read().clone()
    }

    /// Get a valid access token, fetching a new one on a cache miss or when `force` is set
    pub async fn get(&self, force: bool) -> Result<String> {
        if !force && let Some(token) = self.store().get(ACCESS_TOKEN_KEY)? {
            debug!("Using cached access token");
            return Ok(token);
        }

        self.fetch().await
    }

    /// Drop the cached token
    pub fn invalidate(&self) -> Result<()> {
        debug!("Invalidating cached access token");
        self.store().forget(ACCESS_TOKEN_KEY)
    }

    async fn fetch(&self) -> Result<String> {
        debug!("Requesting new access token for {}", self.app_id);

        let query = serde_urlencoded::to_string([
            ("grant_type", "client_credential"),
            ("appid", self.app_id.as_str()),
            ("secret", self.secret.as_str()),
        ])
        .map_err(|e| WechatError::Config(e.to_string()))?;
        let url = format!("{}?{}", self.endpoints.url(Api::TokenGet), query);

        let response: TokenResponse = self.http.get_json(&url).await?;

        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WechatError::api(-1, "No access_token in token response"))?;
        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);

        self.store()
            .put(ACCESS_TOKEN_KEY, &token, Duration::from_secs(expires_in))?;

        info!("Refreshed access token (expires in {}s)", expires_in);
        Ok(token)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}
