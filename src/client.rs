//! Customer-service message sending

use serde::Deserialize;
use tracing::info;

use crate::api::Api;
use crate::error::Result;
use crate::messages::Message;
use crate::wechat::Wechat;

/// Send result
#[derive(Debug, Clone, Deserialize)]
pub struct SendResult {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

/// Sends messages through the customer-service API
///
/// Only allowed within 48h of the user's last interaction.
#[derive(Debug, Clone)]
pub struct Client {
    wechat: Wechat,
}

impl Client {
    pub fn new(wechat: Wechat) -> Self {
        Self { wechat }
    }

    /// Send `message` to a user
    pub async fn send(&self, message: &Message, openid: &str) -> Result<SendResult> {
        let body = self.wechat.report(message.to_client(openid))?;
        let result: SendResult = self.wechat.post_as(Api::MessageSend, &[], &body).await?;

        info!("Sent {} message to {}", message.msg_type(), openid);
        Ok(result)
    }

    /// Shortcut for a text message
    pub async fn send_text(&self, openid: &str, content: &str) -> Result<SendResult> {
        self.send(&Message::text(content), openid).await
    }
}
