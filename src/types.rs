//! Inbound webhook types

use serde::{Deserialize, Serialize};

/// Message type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MsgType {
    Text,
    Image,
    Voice,
    Video,
    Shortvideo,
    Location,
    Link,
    Event,
    #[serde(other)]
    Unknown,
}

/// Webhook verification parameters (GET request)
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyParams {
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
    pub echostr: String,
}

/// Push parameters (POST request)
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
    #[serde(default)]
    pub encrypt_type: Option<String>,
    #[serde(default)]
    pub msg_signature: Option<String>,
}

impl CallbackParams {
    /// Safe mode push
    pub fn is_encrypted(&self) -> bool {
        self.encrypt_type.as_deref() == Some("aes")
    }
}

/// Safe mode push body
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename = "xml")]
pub struct EncryptedEnvelope {
    #[serde(rename = "ToUserName", default)]
    pub to_user_name: Option<String>,
    #[serde(rename = "Encrypt")]
    pub encrypt: String,
}

/// Message or event pushed by the platform
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename = "xml")]
pub struct IncomingMessage {
    /// Account the push was sent to
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    /// OpenID of the sender
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime")]
    pub create_time: i64,
    #[serde(rename = "MsgType")]
    pub msg_type: MsgType,
    #[serde(rename = "Content", default)]
    pub content: Option<String>,
    #[serde(rename = "MsgId", default)]
    pub msg_id: Option<i64>,
    #[serde(rename = "PicUrl", default)]
    pub pic_url: Option<String>,
    #[serde(rename = "MediaId", default)]
    pub media_id: Option<String>,
    #[serde(rename = "Format", default)]
    pub format: Option<String>,
    #[serde(rename = "Recognition", default)]
    pub recognition: Option<String>,
    #[serde(rename = "ThumbMediaId", default)]
    pub thumb_media_id: Option<String>,
    #[serde(rename = "Location_X", default)]
    pub location_x: Option<f64>,
    #[serde(rename = "Location_Y", default)]
    pub location_y: Option<f64>,
    #[serde(rename = "Scale", default)]
    pub scale: Option<u32>,
    #[serde(rename = "Label", default)]
    pub label: Option<String>,
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Url", default)]
    pub url: Option<String>,
    /// Event name (`subscribe`, `CLICK`, `SCAN`, ...)
    #[serde(rename = "Event", default)]
    pub event: Option<String>,
    #[serde(rename = "EventKey", default)]
    pub event_key: Option<String>,
    #[serde(rename = "Ticket", default)]
    pub ticket: Option<String>,
    /// Reported location (LOCATION event)
    #[serde(rename = "Latitude", default)]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude", default)]
    pub longitude: Option<f64>,
    #[serde(rename = "Precision", default)]
    pub precision: Option<f64>,
}

impl IncomingMessage {
    /// Lowercased event name, for event pushes
    pub fn event_name(&self) -> Option<String> {
        match self.msg_type {
            MsgType::Event => self.event.as_ref().map(|e| e.to_lowercase()),
            _ => None,
        }
    }
}
