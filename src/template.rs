//! Template messages

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::api::Api;
use crate::error::Result;
use crate::wechat::Wechat;

// =============================================================================
// Template Message Types
// =============================================================================

/// Template message request
#[derive(Debug, Serialize)]
struct TemplateMessageRequest<'a> {
    touser: &'a str,
    template_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    data: &'a TemplateMessageData,
}

/// Template message data (key-value pairs)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMessageData {
    #[serde(flatten)]
    pub fields: HashMap<String, TemplateField>,
}

impl TemplateMessageData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(mut self, key: &str, value: &str, color: Option<&str>) -> Self {
        self.fields.insert(
            key.to_string(),
            TemplateField {
                value: value.to_string(),
                color: color.map(str::to_string),
            },
        );
        self
    }
}

/// A single field in a template message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateField {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Template message send result
#[derive(Debug, Deserialize)]
pub struct TemplateMessageResult {
    #[serde(default)]
    pub msgid: Option<i64>,
}

// =============================================================================
// Template API
// =============================================================================

#[derive(Debug, Clone)]
pub struct Template {
    wechat: Wechat,
}

impl Template {
    pub fn new(wechat: Wechat) -> Self {
        Self { wechat }
    }

    /// Send a template message
    pub async fn send(
        &self,
        to_user: &str,
        template_id: &str,
        data: &TemplateMessageData,
        url: Option<&str>,
    ) -> Result<TemplateMessageResult> {
        let request = TemplateMessageRequest {
            touser: to_user,
            template_id,
            url,
            data,
        };

        debug!("Sending template message to user: {}", to_user);
        let result: TemplateMessageResult = self
            .wechat
            .post_as(Api::TemplateSend, &[], &request)
            .await?;

        info!("Template message sent, msgid: {:?}", result.msgid);
        Ok(result)
    }

    /// Set the account's primary and secondary industry
    pub async fn set_industry(&self, primary: u32, secondary: u32) -> Result<()> {
        self.wechat
            .post(
                Api::TemplateSetIndustry,
                &[],
                &json!({
                    "industry_id1": primary.to_string(),
                    "industry_id2": secondary.to_string(),
                }),
            )
            .await?;
        Ok(())
    }
}
