//! Parametric QR codes

use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::Api;
use crate::error::{Result, WechatError};
use crate::wechat::Wechat;

/// Longest lifetime of a temporary code (30 days)
pub const MAX_EXPIRE_SECONDS: u64 = 2_592_000;

/// Created QR code
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ticket {
    pub ticket: String,
    /// Absent for permanent codes
    #[serde(default)]
    pub expire_seconds: Option<u64>,
    /// Content encoded in the image
    #[serde(default)]
    pub url: Option<String>,
}

/// QR code API
#[derive(Debug, Clone)]
pub struct QrCode {
    wechat: Wechat,
}

impl QrCode {
    pub fn new(wechat: Wechat) -> Self {
        Self { wechat }
    }

    /// Temporary code with an integer scene
    pub async fn temporary(&self, scene_id: u32, expire_seconds: u64) -> Result<Ticket> {
        if expire_seconds == 0 || expire_seconds > MAX_EXPIRE_SECONDS {
            return self.wechat.report(Err(WechatError::Config(format!(
                "expire_seconds must be within 1..={}",
                MAX_EXPIRE_SECONDS
            ))));
        }

        self.create(json!({
            "expire_seconds": expire_seconds,
            "action_name": "QR_SCENE",
            "action_info": { "scene": { "scene_id": scene_id } },
        }))
        .await
    }

    /// Permanent code with an integer scene (1..=100000)
    pub async fn forever(&self, scene_id: u32) -> Result<Ticket> {
        if !(1..=100_000).contains(&scene_id) {
            return self.wechat.report(Err(WechatError::Config(
                "Permanent scene_id must be within 1..=100000".into(),
            )));
        }

        self.create(json!({
            "action_name": "QR_LIMIT_SCENE",
            "action_info": { "scene": { "scene_id": scene_id } },
        }))
        .await
    }

    /// Permanent code with a string scene (1 to 64 characters)
    pub async fn forever_str(&self, scene_str: &str) -> Result<Ticket> {
        if scene_str.is_empty() || scene_str.chars().count() > 64 {
            return self.wechat.report(Err(WechatError::Config(
                "scene_str must be 1 to 64 characters".into(),
            )));
        }

        self.create(json!({
            "action_name": "QR_LIMIT_STR_SCENE",
            "action_info": { "scene": { "scene_str": scene_str } },
        }))
        .await
    }

    async fn create(&self, body: Value) -> Result<Ticket> {
        self.wechat.post_as(Api::QrcodeCreate, &[], &body).await
    }

    /// Image URL of a ticket
    pub async fn url(&self, ticket: &str) -> Result<String> {
        self.wechat
            .make_url(Api::QrcodeShow, &[("ticket", ticket)])
            .await
    }
}
