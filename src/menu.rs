//! Custom menu

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::Api;
use crate::error::{Result, WechatError};
use crate::wechat::Wechat;

/// Most top-level buttons a menu may have
pub const MAX_BUTTONS: usize = 3;
/// Most entries in a sub-menu
pub const MAX_SUB_BUTTONS: usize = 5;

/// Menu button
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_button: Vec<Button>,
}

impl Button {
    /// Button that pushes a `CLICK` event with `key`
    pub fn click(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some("click".to_string()),
            key: Some(key.into()),
            ..Default::default()
        }
    }

    /// Button that opens `url`
    pub fn view(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some("view".to_string()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Button of another event type (`scancode_push`, `pic_sysphoto`, `location_select`, ...)
    pub fn event(kind: impl Into<String>, name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind.into()),
            key: Some(key.into()),
            ..Default::default()
        }
    }

    /// Parent of a sub-menu
    pub fn parent(name: impl Into<String>, sub_button: Vec<Button>) -> Self {
        Self {
            name: name.into(),
            sub_button,
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct MenuBody<'a> {
    button: &'a [Button],
}

/// Menu API
#[derive(Debug, Clone)]
pub struct Menu {
    wechat: Wechat,
}

impl Menu {
    pub fn new(wechat: Wechat) -> Self {
        Self { wechat }
    }

    pub async fn create(&self, buttons: &[Button]) -> Result<()> {
        self.wechat.report(validate(buttons))?;
        self.wechat
            .post(Api::MenuCreate, &[], &MenuBody { button: buttons })
            .await?;
        Ok(())
    }

    /// Current menu buttons
    pub async fn get(&self) -> Result<Vec<Button>> {
        let response = self.wechat.get(Api::MenuGet, &[]).await?;
        let buttons = response
            .pointer("/menu/button")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        self.wechat
            .report(serde_json::from_value(buttons).map_err(Into::into))
    }

    pub async fn delete(&self) -> Result<()> {
        self.wechat.get(Api::MenuDelete, &[]).await?;
        Ok(())
    }
}

fn validate(buttons: &[Button]) -> Result<()> {
    if buttons.is_empty() || buttons.len() > MAX_BUTTONS {
        return Err(WechatError::Config(format!(
            "Menu needs 1 to {} buttons, got {}",
            MAX_BUTTONS,
            buttons.len()
        )));
    }
    if let Some(button) = buttons.iter().find(|b| b.sub_button.len() > MAX_SUB_BUTTONS) {
        return Err(WechatError::Config(format!(
            "Sub-menu '{}' has {} entries, at most {} allowed",
            button.name,
            button.sub_button.len(),
            MAX_SUB_BUTTONS
        )));
    }
    Ok(())
}
