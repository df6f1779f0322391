//! Temporary media upload and download

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;
use tracing::{debug, info};

use crate::api::Api;
use crate::error::{Result, WechatError};
use crate::http::UploadFile;
use crate::wechat::Wechat;

/// Media kinds accepted by the upload API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Voice,
    Video,
    Thumb,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Voice => "voice",
            MediaType::Video => "video",
            MediaType::Thumb => "thumb",
        }
    }

    /// Upload size limit in bytes
    pub fn max_size(self) -> usize {
        match self {
            MediaType::Image | MediaType::Voice => 2 * 1024 * 1024,
            MediaType::Video => 10 * 1024 * 1024,
            MediaType::Thumb => 64 * 1024,
        }
    }

    /// File extension used when saving downloads
    fn extension(self) -> &'static str {
        match self {
            MediaType::Image | MediaType::Thumb => "jpg",
            MediaType::Voice => "amr",
            MediaType::Video => "mp4",
        }
    }
}

/// Upload response; thumbs come back as `thumb_media_id`
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    media_id: Option<String>,
    #[serde(default)]
    thumb_media_id: Option<String>,
}

/// Media API
#[derive(Debug, Clone)]
pub struct Media {
    wechat: Wechat,
}

impl Media {
    pub fn new(wechat: Wechat) -> Self {
        Self { wechat }
    }

    /// Upload a file, returning its media id
    pub async fn upload(&self, media_type: MediaType, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let bytes = self.wechat.report(read_media(media_type, path).await)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("media.{}", media_type.extension()));

        debug!("Uploading {} {:?} ({} bytes)", media_type.as_str(), path, bytes.len());

        let response = self
            .wechat
            .upload(
                Api::FileUpload,
                &[("type", media_type.as_str())],
                UploadFile::new("media", file_name, bytes),
            )
            .await?;
        let media_id = self.wechat.report(media_id_of(response))?;

        info!("Uploaded {} as {}", media_type.as_str(), media_id);
        Ok(media_id)
    }

    pub async fn image(&self, path: impl AsRef<Path>) -> Result<String> {
        self.upload(MediaType::Image, path).await
    }

    pub async fn voice(&self, path: impl AsRef<Path>) -> Result<String> {
        self.upload(MediaType::Voice, path).await
    }

    pub async fn video(&self, path: impl AsRef<Path>) -> Result<String> {
        self.upload(MediaType::Video, path).await
    }

    pub async fn thumb(&self, path: impl AsRef<Path>) -> Result<String> {
        self.upload(MediaType::Thumb, path).await
    }

    /// Raw bytes of a media file
    pub async fn fetch(&self, media_id: &str) -> Result<Vec<u8>> {
        self.wechat
            .download(Api::FileGet, &[("media_id", media_id)])
            .await
    }

    /// Download a media file into `dest_dir`, returning the written path
    pub async fn download(
        &self,
        media_id: &str,
        media_type: MediaType,
        dest_dir: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        self.wechat.report(check_media_id(media_id))?;
        let data = self.fetch(media_id).await?;

        let path = dest_dir
            .as_ref()
            .join(format!("{}.{}", media_id, media_type.extension()));

        self.wechat.report(save(&path, &data).await)?;

        debug!("Saved media {} to {:?} ({} bytes)", media_id, path, data.len());
        Ok(path)
    }
}

/// Read an upload, checking existence and the size limit of its type
async fn read_media(media_type: MediaType, path: &Path) -> Result<Vec<u8>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WechatError::Media(format!("File does not exist: {:?}", path)));
        }
        Err(e) => return Err(e.into()),
    };

    if bytes.len() > media_type.max_size() {
        return Err(WechatError::Media(format!(
            "{} too large: {} bytes (max: {})",
            media_type.as_str(),
            bytes.len(),
            media_type.max_size()
        )));
    }

    Ok(bytes)
}

fn media_id_of(response: serde_json::Value) -> Result<String> {
    let response: UploadResponse = serde_json::from_value(response)?;
    response
        .media_id
        .or(response.thumb_media_id)
        .ok_or_else(|| WechatError::Media("No media_id in upload response".into()))
}

/// Media ids become file names, so they must stay a single path component
fn check_media_id(media_id: &str) -> Result<()> {
    if media_id.is_empty() || media_id.contains(['/', '\\']) || media_id.contains("..") {
        return Err(WechatError::Media(format!("Invalid media_id: {:?}", media_id)));
    }
    Ok(())
}

async fn save(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, data).await?;
    Ok(())
}
