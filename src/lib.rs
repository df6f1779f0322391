//! WeChat Official Account SDK
//!
//! Client and server side of the Official Account HTTP API.
//!
//! # Architecture
//!
//! ```text
//! Wechat (facade) ──▶ AccessToken ──▶ CacheStore (file / memory / closures)
//!    │                     └────────▶ token.get
//!    ├── Client, Media, Menu, Group, User, Auth, QrCode, Template ──HTTPS──▶ WeChat API
//!    └── Server ◀──webhook── WeChat Server
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use wechat_sdk::prelude::*;
//!
//! let wechat = Wechat::make(WechatConfig::new("wx1234567890abcdef", "secret", "token"))?;
//! wechat.on_error(|e| eprintln!("wechat error: {e}"));
//!
//! // Client side
//! wechat.client().send(&Message::text("Hello"), "openid").await?;
//!
//! // Server side
//! wechat.server().on_message(MsgType::Text, |msg| {
//!     Some(Message::text(format!("You said: {}", msg.content.as_deref().unwrap_or(""))))
//! });
//! let app = wechat.server().router();
//! ```

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod group;
pub mod http;
pub mod media;
pub mod menu;
pub mod messages;
pub mod qrcode;
pub mod server;
pub mod template;
pub mod token;
pub mod types;
pub mod user;
pub mod wechat;
pub mod xml;

pub use api::{Api, Endpoints};
pub use cache::{CacheStore, FileCache, FnCache, LayeredCache, MemoryCache};
pub use config::WechatConfig;
pub use crypto::WechatCrypto;
pub use error::{Result, WechatError};
pub use messages::{Article, Message};
pub use server::Server;
pub use types::*;
pub use wechat::Wechat;

/// Prelude for common imports
pub mod prelude {
    pub use crate::api::{Api, Endpoints};
    pub use crate::cache::{CacheStore, FileCache, MemoryCache};
    pub use crate::config::WechatConfig;
    pub use crate::error::{Result, WechatError};
    pub use crate::messages::{Article, Message};
    pub use crate::types::*;
    pub use crate::wechat::Wechat;
}
