//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::api::Endpoints;
use crate::error::{Result, WechatError};

/// SDK configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WechatConfig {
    // =========================================================================
    // Account credentials
    // =========================================================================
    /// Official Account AppID
    pub app_id: String,

    /// AppSecret, used to fetch access tokens
    pub secret: String,

    /// Token for webhook signature verification
    pub token: String,

    /// EncodingAESKey (43 characters), required for safe mode
    #[serde(default)]
    pub encoding_aes_key: Option<String>,

    // =========================================================================
    // Runtime
    // =========================================================================
    /// Directory for the file-backed token cache (system temp dir when unset)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Webhook server bind address
    #[serde(default = "default_webhook_addr")]
    pub webhook_addr: String,

    /// Path the webhook is mounted on
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    /// Timeout for outgoing API requests
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Log raw inbound XML
    #[serde(default)]
    pub debug_mode: bool,

    /// API hosts
    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_webhook_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_webhook_path() -> String {
    "/wechat".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl WechatConfig {
    pub fn new(
        app_id: impl Into<String>,
        secret: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            secret: secret.into(),
            token: token.into(),
            encoding_aes_key: None,
            cache_dir: None,
            webhook_addr: default_webhook_addr(),
            webhook_path: default_webhook_path(),
            request_timeout_secs: default_request_timeout(),
            debug_mode: false,
            endpoints: Endpoints::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let config = Self {
            app_id: std::env::var("WECHAT_APP_ID").unwrap_or_default(),
            secret: std::env::var("WECHAT_SECRET").unwrap_or_default(),
            token: std::env::var("WECHAT_TOKEN").unwrap_or_default(),
            encoding_aes_key: std::env::var("WECHAT_ENCODING_AES_KEY").ok(),
            cache_dir: std::env::var("WECHAT_CACHE_DIR").ok().map(PathBuf::from),
            webhook_addr: std::env::var("WEBHOOK_ADDR").unwrap_or_else(|_| default_webhook_addr()),
            webhook_path: std::env::var("WEBHOOK_PATH").unwrap_or_else(|_| default_webhook_path()),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_request_timeout),
            debug_mode: std::env::var("DEBUG_MODE").is_ok(),
            endpoints: Endpoints::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// AppID, secret and token must all be present
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("app_id", &self.app_id),
            ("secret", &self.secret),
            ("token", &self.token),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(WechatError::Config(format!(
                "'app_id', 'secret' and 'token' are required, missing: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn with_encoding_aes_key(mut self, key: impl Into<String>) -> Self {
        self.encoding_aes_key = Some(key.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_webhook_path(mut self, path: impl Into<String>) -> Self {
        self.webhook_path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }
}
