//! Outgoing message formatters
//!
//! Every [`Message`] renders two ways:
//! - [`Message::to_client`]: JSON body for the customer-service send API
//! - [`Message::to_server`]: XML passive reply to a webhook push

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Result, WechatError};
use crate::xml::{self, XmlNode};

/// Most articles a news message may carry
pub const MAX_ARTICLES: usize = 8;

/// One entry of a news message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "picurl", default, skip_serializing_if = "Option::is_none")]
    pub pic_url: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn pic_url(mut self, pic_url: impl Into<String>) -> Self {
        self.pic_url = Some(pic_url.into());
        self
    }

    fn to_xml(&self) -> XmlNode {
        XmlNode::element()
            .text("Title", self.title.as_str())
            .text_opt("Description", self.description.as_deref())
            .text_opt("PicUrl", self.pic_url.as_deref())
            .text_opt("Url", self.url.as_deref())
    }
}

/// Outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text {
        content: String,
    },
    Image {
        media_id: String,
    },
    Voice {
        media_id: String,
    },
    Video {
        media_id: String,
        title: Option<String>,
        description: Option<String>,
        thumb_media_id: Option<String>,
    },
    Music {
        title: Option<String>,
        description: Option<String>,
        music_url: String,
        hq_music_url: Option<String>,
        thumb_media_id: String,
    },
    News {
        articles: Vec<Article>,
    },
    /// Hand the conversation to a customer-service agent (passive reply only)
    Transfer,
}

impl Message {
    pub fn text(content: impl Into<String>) -> Self {
        Message::Text {
            content: content.into(),
        }
    }

    pub fn image(media_id: impl Into<String>) -> Self {
        Message::Image {
            media_id: media_id.into(),
        }
    }

    pub fn voice(media_id: impl Into<String>) -> Self {
        Message::Voice {
            media_id: media_id.into(),
        }
    }

    pub fn video(
        media_id: impl Into<String>,
        title: Option<String>,
        description: Option<String>,
    ) -> Self {
        Message::Video {
            media_id: media_id.into(),
            title,
            description,
            thumb_media_id: None,
        }
    }

    pub fn music(music_url: impl Into<String>, thumb_media_id: impl Into<String>) -> Self {
        Message::Music {
            title: None,
            description: None,
            music_url: music_url.into(),
            hq_music_url: None,
            thumb_media_id: thumb_media_id.into(),
        }
    }

    pub fn news(articles: Vec<Article>) -> Self {
        Message::News { articles }
    }

    pub fn transfer() -> Self {
        Message::Transfer
    }

    /// `msgtype` / `MsgType` value
    pub fn msg_type(&self) -> &'static str {
        match self {
            Message::Text { .. } => "text",
            Message::Image { .. } => "image",
            Message::Voice { .. } => "voice",
            Message::Video { .. } => "video",
            Message::Music { .. } => "music",
            Message::News { .. } => "news",
            Message::Transfer => "transfer_customer_service",
        }
    }

    fn check(&self) -> Result<()> {
        if let Message::News { articles } = self {
            if articles.is_empty() {
                return Err(WechatError::Config("News message has no articles".into()));
            }
            if articles.len() > MAX_ARTICLES {
                return Err(WechatError::Config(format!(
                    "News message has {} articles, at most {} allowed",
                    articles.len(),
                    MAX_ARTICLES
                )));
            }
        }
        Ok(())
    }

    /// Body for the customer-service send API
    pub fn to_client(&self, to: &str) -> Result<Value> {
        self.check()?;

        let body = match self {
            Message::Text { content } => json!({ "content": content }),
            Message::Image { media_id } | Message::Voice { media_id } => {
                json!({ "media_id": media_id })
            }
            Message::Video {
                media_id,
                title,
                description,
                thumb_media_id,
            } => json!({
                "media_id": media_id,
                "thumb_media_id": thumb_media_id,
                "title": title,
                "description": description,
            }),
            Message::Music {
                title,
                description,
                music_url,
                hq_music_url,
                thumb_media_id,
            } => json!({
                "title": title,
                "description": description,
                "musicurl": music_url,
                "hqmusicurl": hq_music_url.as_ref().unwrap_or(music_url),
                "thumb_media_id": thumb_media_id,
            }),
            Message::News { articles } => json!({ "articles": articles }),
            Message::Transfer => {
                return Err(WechatError::Config(
                    "Transfer can only be sent as a passive reply".into(),
                ));
            }
        };

        let mut message = json!({
            "touser": to,
            "msgtype": self.msg_type(),
        });
        message[self.msg_type()] = strip_nulls(body);
        Ok(message)
    }

    /// Passive reply XML
    pub fn to_server(&self, to: &str, from: &str, create_time: i64) -> Result<String> {
        self.check()?;

        let head = XmlNode::element()
            .text("ToUserName", to)
            .text("FromUserName", from)
            .raw("CreateTime", create_time)
            .text("MsgType", self.msg_type());

        let reply = match self {
            Message::Text { content } => head.text("Content", content.as_str()),
            Message::Image { media_id } => {
                head.node("Image", XmlNode::element().text("MediaId", media_id.as_str()))
            }
            Message::Voice { media_id } => {
                head.node("Voice", XmlNode::element().text("MediaId", media_id.as_str()))
            }
            Message::Video {
                media_id,
                title,
                description,
                ..
            } => head.node(
                "Video",
                XmlNode::element()
                    .text("MediaId", media_id.as_str())
                    .text_opt("Title", title.as_deref())
                    .text_opt("Description", description.as_deref()),
            ),
            Message::Music {
                title,
                description,
                music_url,
                hq_music_url,
                thumb_media_id,
            } => head.node(
                "Music",
                XmlNode::element()
                    .text_opt("Title", title.as_deref())
                    .text_opt("Description", description.as_deref())
                    .text("MusicUrl", music_url.as_str())
                    .text("HQMusicUrl", hq_music_url.as_ref().unwrap_or(music_url).as_str())
                    .text("ThumbMediaId", thumb_media_id.as_str()),
            ),
            Message::News { articles } => head
                .raw("ArticleCount", articles.len())
                .items("Articles", articles.iter().map(Article::to_xml).collect()),
            Message::Transfer => head,
        };

        Ok(xml::build("xml", &reply))
    }
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => other,
    }
}
