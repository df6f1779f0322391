//! Error types

/// Errors returned by the SDK
#[derive(Debug, thiserror::Error)]
pub enum WechatError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-zero `errcode` returned by the platform
    #[error("[{code}] {message}")]
    Api { code: i64, message: String },

    #[error("Request failed, empty response")]
    EmptyResponse,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Media error: {0}")]
    Media(String),
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, WechatError>;

impl WechatError {
    pub(crate) fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Whether the platform rejected the access token (invalid, not latest or expired)
    pub fn is_token_expired(&self) -> bool {
        matches!(self, Self::Api { code, .. } if matches!(code, 40001 | 40014 | 42001))
    }

    /// Platform error code, if this is an API error
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<serde_xml_rs::Error> for WechatError {
    fn from(e: serde_xml_rs::Error) -> Self {
        Self::Xml(e.to_string())
    }
}
