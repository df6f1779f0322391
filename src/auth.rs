//! OAuth web authorization
//!
//! 1. Redirect the user to [`Auth::authorize_url`]
//! 2. Exchange the `code` the platform hands back with [`Auth::access_token`]
//! 3. With scope `snsapi_userinfo`, read the profile with [`Auth::user`]

use serde::{Deserialize, Serialize};

use crate::api::Api;
use crate::error::{Result, WechatError};
use crate::wechat::Wechat;

/// Authorization scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Silent, OpenID only
    Base,
    /// Asks the user, grants profile access
    UserInfo,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Base => "snsapi_base",
            Scope::UserInfo => "snsapi_userinfo",
        }
    }
}

/// Per-user OAuth token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OauthToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub openid: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub unionid: Option<String>,
}

/// Profile obtained through OAuth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OauthUser {
    pub openid: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub sex: Option<i32>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub headimgurl: Option<String>,
    #[serde(default)]
    pub privilege: Vec<String>,
    #[serde(default)]
    pub unionid: Option<String>,
}

/// OAuth API
#[derive(Debug, Clone)]
pub struct Auth {
    wechat: Wechat,
}

impl Auth {
    pub fn new(wechat: Wechat) -> Self {
        Self { wechat }
    }

    /// URL to send the user's browser to
    pub fn authorize_url(&self, redirect_uri: &str, scope: Scope, state: &str) -> Result<String> {
        let config = self.wechat.config();
        let query = serde_urlencoded::to_string([
            ("appid", config.app_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state),
        ])
        .map_err(|e| WechatError::Config(e.to_string()))?;

        Ok(format!(
            "{}?{}#wechat_redirect",
            config.endpoints.url(Api::AuthUrl),
            query
        ))
    }

    /// Exchange an authorization code for a user token
    pub async fn access_token(&self, code: &str) -> Result<OauthToken> {
        let config = self.wechat.config();
        self.wechat
            .get_as(
                Api::AuthAccessToken,
                &[
                    ("appid", config.app_id.as_str()),
                    ("secret", config.secret.as_str()),
                    ("code", code),
                    ("grant_type", "authorization_code"),
                ],
            )
            .await
    }

    /// Profile of the authorizing user
    pub async fn user(&self, token: &OauthToken, lang: &str) -> Result<OauthUser> {
        self.wechat
            .get_as(
                Api::UserOauthGet,
                &[
                    ("access_token", token.access_token.as_str()),
                    ("openid", token.openid.as_str()),
                    ("lang", lang),
                ],
            )
            .await
    }
}
