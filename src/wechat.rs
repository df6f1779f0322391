//! The `Wechat` facade
//!
//! Owns configuration, the HTTP client, the access-token cache and the error
//! handler, and hands out the API helpers ([`Client`], [`Media`], [`Menu`], ...).
//! Calls made through [`Wechat::get`] / [`Wechat::post`] get the access token
//! injected and are retried once with a fresh token when the platform rejects
//! the cached one.

use parking_lot::RwLock;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::api::Api;
use crate::auth::Auth;
use crate::cache::{CacheReader, CacheStore, CacheWriter, FileCache, LayeredCache};
use crate::client::Client;
use crate::config::WechatConfig;
use crate::crypto::WechatCrypto;
use crate::error::{Result, WechatError};
use crate::group::Group;
use crate::http::{HttpClient, UploadFile};
use crate::media::Media;
use crate::menu::Menu;
use crate::qrcode::QrCode;
use crate::server::Server;
use crate::template::Template;
use crate::token::AccessToken;
use crate::user::User;

/// Callback invoked with every failed API call
pub type ErrorHandler = Arc<dyn Fn(&WechatError) + Send + Sync>;

/// Query pairs appended to an endpoint URL
pub type Query<'a> = &'a [(&'a str, &'a str)];

enum Payload {
    Empty,
    Json(Value),
    File(UploadFile),
}

struct Inner {
    config: WechatConfig,
    http: HttpClient,
    token: AccessToken,
    /// Store the closures fall back to
    base_store: RwLock<Arc<dyn CacheStore>>,
    crypto: Option<WechatCrypto>,
    auto_request_token: AtomicBool,
    error_handler: RwLock<Option<ErrorHandler>>,
    cache_reader: RwLock<Option<CacheReader>>,
    cache_writer: RwLock<Option<CacheWriter>>,
    server: OnceLock<Server>,
}

/// SDK entry point
#[derive(Clone)]
pub struct Wechat {
    inner: Arc<Inner>,
}

impl Wechat {
    /// Create an instance; `app_id`, `secret` and `token` are required
    pub fn make(config: WechatConfig) -> Result<Self> {
        config.validate()?;

        let http = HttpClient::new(Duration::from_secs(config.request_timeout_secs))?;

        let file_cache = match &config.cache_dir {
            Some(dir) => FileCache::new(dir, &config.app_id),
            None => FileCache::in_temp_dir(&config.app_id),
        };
        let base_store: Arc<dyn CacheStore> = Arc::new(file_cache);

        let crypto = config
            .encoding_aes_key
            .as_deref()
            .map(|key| WechatCrypto::new(key, &config.app_id))
            .transpose()?;

        let token = AccessToken::new(
            &config.app_id,
            &config.secret,
            config.endpoints.clone(),
            http.clone(),
            base_store.clone(),
        );

        debug!(
            "Wechat instance for {} (safe mode: {})",
            config.app_id,
            crypto.is_some()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http,
                token,
                base_store: RwLock::new(base_store),
                crypto,
                auto_request_token: AtomicBool::new(true),
                error_handler: RwLock::new(None),
                cache_reader: RwLock::new(None),
                cache_writer: RwLock::new(None),
                server: OnceLock::new(),
            }),
        })
    }

    pub fn config(&self) -> &WechatConfig {
        &self.inner.config
    }

    pub fn crypto(&self) -> Option<&WechatCrypto> {
        self.inner.crypto.as_ref()
    }

    pub fn http(&self) -> &HttpClient {
        &self.inner.http
    }

    // =========================================================================
    // Error handler
    // =========================================================================

    /// Register the error handler
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&WechatError) + Send + Sync + 'static,
    {
        *self.inner.error_handler.write() = Some(Arc::new(handler));
    }

    pub(crate) fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            error!("Wechat API call failed: {}", e);
            let handler = self.inner.error_handler.read().clone();
            if let Some(handler) = handler {
                handler(e);
            }
        }
        result
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// Replace the token cache store, dropping any reader/writer closures
    pub fn cache_store(&self, store: Arc<dyn CacheStore>) {
        *self.inner.base_store.write() = store.clone();
        *self.inner.cache_reader.write() = None;
        *self.inner.cache_writer.write() = None;
        self.inner.token.set_store(store);
    }

    /// Read cached values through `reader`; writes keep their current target
    pub fn cache_reader<F>(&self, reader: F)
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        *self.inner.cache_reader.write() = Some(Arc::new(reader));
        self.install_layered_cache();
    }

    /// Write cached values through `writer` (`None` value means forget)
    pub fn cache_writer<F>(&self, writer: F)
    where
        F: Fn(&str, Option<&str>, Duration) + Send + Sync + 'static,
    {
        *self.inner.cache_writer.write() = Some(Arc::new(writer));
        self.install_layered_cache();
    }

    /// Put the registered closures in front of the current store
    fn install_layered_cache(&self) {
        let mut layered = LayeredCache::new(self.inner.base_store.read().clone());
        if let Some(reader) = self.inner.cache_reader.read().clone() {
            layered = layered.with_reader(reader);
        }
        if let Some(writer) = self.inner.cache_writer.read().clone() {
            layered = layered.with_writer(writer);
        }
        self.inner.token.set_store(Arc::new(layered));
    }

    // =========================================================================
    // Access token
    // =========================================================================

    /// Toggle access-token injection in [`Wechat::make_url`]
    pub fn auto_request_token(&self, enabled: bool) {
        self.inner
            .auto_request_token
            .store(enabled, Ordering::SeqCst);
    }

    pub fn is_auto_request_token(&self) -> bool {
        self.inner.auto_request_token.load(Ordering::SeqCst)
    }

    /// Current access token, from cache when possible
    pub async fn access_token(&self) -> Result<String> {
        let token = self.inner.token.get(false).await;
        self.report(token)
    }

    /// Fetch a new access token regardless of the cache
    pub async fn refresh_access_token(&self) -> Result<String> {
        let token = self.inner.token.get(true).await;
        self.report(token)
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Endpoint URL with urlencoded query, plus `access_token` when injection is on
    pub async fn make_url(&self, api: Api, queries: Query<'_>) -> Result<String> {
        let url = self.build_url(api, queries).await;
        self.report(url)
    }

    async fn build_url(&self, api: Api, queries: Query<'_>) -> Result<String> {
        let mut pairs: Vec<(&str, &str)> = queries.to_vec();

        let token;
        if self.is_auto_request_token() && api.needs_token() {
            token = self.inner.token.get(false).await?;
            pairs.push(("access_token", token.as_str()));
        }

        let base = self.inner.config.endpoints.url(api);
        if pairs.is_empty() {
            return Ok(base);
        }

        let query =
            serde_urlencoded::to_string(&pairs).map_err(|e| WechatError::Config(e.to_string()))?;
        Ok(format!("{}?{}", base, query))
    }

    /// Raw request to a full URL
    ///
    /// GET sends `params` as query string; POST sends JSON, or multipart when
    /// `files` are given. An empty body or a non-zero `errcode` is an error.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        params: &Value,
        files: &[UploadFile],
    ) -> Result<Value> {
        let response = self.inner.http.request(method, url, params, files).await;
        self.report(response)
    }

    /// GET an endpoint
    pub async fn get(&self, api: Api, queries: Query<'_>) -> Result<Value> {
        self.call(Method::GET, api, queries, Payload::Empty).await
    }

    /// POST a JSON body to an endpoint
    pub async fn post<B: Serialize>(&self, api: Api, queries: Query<'_>, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body);
        match body {
            Ok(body) => self.call(Method::POST, api, queries, Payload::Json(body)).await,
            Err(e) => self.report(Err(e.into())),
        }
    }

    /// Multipart upload to an endpoint
    pub async fn upload(&self, api: Api, queries: Query<'_>, file: UploadFile) -> Result<Value> {
        self.call(Method::POST, api, queries, Payload::File(file))
            .await
    }

    pub async fn get_as<T: DeserializeOwned>(&self, api: Api, queries: Query<'_>) -> Result<T> {
        let value = self.get(api, queries).await?;
        self.report(serde_json::from_value(value).map_err(Into::into))
    }

    pub async fn post_as<B: Serialize, T: DeserializeOwned>(
        &self,
        api: Api,
        queries: Query<'_>,
        body: &B,
    ) -> Result<T> {
        let value = self.post(api, queries, body).await?;
        self.report(serde_json::from_value(value).map_err(Into::into))
    }

    /// GET an endpoint that answers with a file
    ///
    /// A JSON body carrying a non-zero `errcode` is still an error.
    pub async fn download(&self, api: Api, queries: Query<'_>) -> Result<Vec<u8>> {
        self.with_token_retry(api, move || async move {
            let url = self.build_url(api, queries).await?;
            self.inner.http.download(&url).await
        })
        .await
    }

    async fn call(&self, method: Method, api: Api, queries: Query<'_>, payload: Payload) -> Result<Value> {
        let payload = &payload;
        self.with_token_retry(api, move || self.call_once(method.clone(), api, queries, payload))
            .await
    }

    /// Run `send`, once more with a fresh token if the platform rejected the cached one
    async fn with_token_retry<T, F, Fut>(&self, api: Api, send: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let result = match send().await {
            Err(e)
                if e.is_token_expired() && api.needs_token() && self.is_auto_request_token() =>
            {
                warn!("Access token rejected on {} ({}), refetching", api.name(), e);
                match self.inner.token.invalidate() {
                    Ok(()) => send().await,
                    Err(e) => Err(e),
                }
            }
            other => other,
        };

        self.report(result)
    }

    async fn call_once(
        &self,
        method: Method,
        api: Api,
        queries: Query<'_>,
        payload: &Payload,
    ) -> Result<Value> {
        let url = self.build_url(api, queries).await?;
        let http = &self.inner.http;

        match payload {
            Payload::Empty => http.request(method, &url, &Value::Null, &[]).await,
            Payload::Json(body) => http.request(method, &url, body, &[]).await,
            Payload::File(file) => {
                http.request(method, &url, &Value::Null, std::slice::from_ref(file))
                    .await
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Webhook side; created once per instance
    pub fn server(&self) -> Server {
        self.inner
            .server
            .get_or_init(|| Server::new(self.inner.config.clone(), self.inner.crypto.clone()))
            .clone()
    }

    /// Customer-service message sender
    pub fn client(&self) -> Client {
        Client::new(self.clone())
    }

    pub fn media(&self) -> Media {
        Media::new(self.clone())
    }

    pub fn menu(&self) -> Menu {
        Menu::new(self.clone())
    }

    pub fn group(&self) -> Group {
        Group::new(self.clone())
    }

    pub fn user(&self) -> User {
        User::new(self.clone())
    }

    pub fn auth(&self) -> Auth {
        Auth::new(self.clone())
    }

    pub fn qrcode(&self) -> QrCode {
        QrCode::new(self.clone())
    }

    pub fn template(&self) -> Template {
        Template::new(self.clone())
    }
}

impl std::fmt::Debug for Wechat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wechat")
            .field("app_id", &self.inner.config.app_id)
            .field("auto_request_token", &self.is_auto_request_token())
            .finish_non_exhaustive()
    }
}
