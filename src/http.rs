//! HTTP transport wrapper
//!
//! Thin layer over `reqwest` that decodes the platform's JSON envelope: an
//! empty body or a non-zero `errcode` is turned into a [`WechatError`].

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, WechatError};

/// File attached to a multipart request
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Form field name (`media` for media uploads)
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// HTTP client for API calls
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Issue a request and decode the JSON envelope
    ///
    /// GET sends `params` as query string. POST sends them as JSON body, or as
    /// multipart form fields when `files` is non-empty.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        params: &Value,
        files: &[UploadFile],
    ) -> Result<Value> {
        debug!("{} {}", method, redact(url));

        let builder = self.http.request(method.clone(), url);
        let builder = if method == Method::GET {
            builder.query(&query_pairs(params))
        } else if files.is_empty() {
            if params.is_null() {
                builder
            } else {
                builder.json(params)
            }
        } else {
            let mut form = Form::new();
            for (key, value) in query_pairs(params) {
                form = form.text(key, value);
            }
            for file in files {
                let part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
                form = form.part(file.field.clone(), part);
            }
            builder.multipart(form)
        };

        let body = builder.send().await?.bytes().await?;
        decode(&body)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let value = self.request(Method::GET, url, &Value::Null, &[]).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let value = self.request(Method::POST, url, &body, &[]).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn upload<T: DeserializeOwned>(&self, url: &str, file: UploadFile) -> Result<T> {
        let value = self
            .request(Method::POST, url, &Value::Null, std::slice::from_ref(&file))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fetch raw bytes; a JSON body carrying an `errcode` is still an error
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", redact(url));

        let response = self.http.get(url).send().await?;
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json") || ct.starts_with("text/plain"));

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(WechatError::EmptyResponse);
        }
        if is_json {
            decode(&body)?;
        }
        Ok(body.to_vec())
    }
}

/// Decode a JSON envelope, mapping `errcode` to an error
pub fn decode(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(WechatError::EmptyResponse);
    }

    let contents: Value = serde_json::from_slice(body)?;

    if let Some(code) = contents.get("errcode").and_then(Value::as_i64)
        && code != 0
    {
        let message = contents
            .get("errmsg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        warn!("API error: {} - {}", code, message);
        return Err(WechatError::Api { code, message });
    }

    Ok(contents)
}

/// Flatten a JSON object into query pairs; nested values are JSON-encoded
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    match params {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Hide credentials before a URL hits the log
fn redact(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let query: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if matches!(key, "access_token" | "secret") => format!("{}=***", key),
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", base, query.join("&"))
}
