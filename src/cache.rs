//! Token cache stores
//!
//! The access token is cached through a [`CacheStore`]. Three stores ship with
//! the crate:
//!
//! - [`FileCache`]: one JSON file per key, the default
//! - [`MemoryCache`]: in-process, lost on restart
//! - [`FnCache`]: user-supplied reader/writer closures
//!
//! [`LayeredCache`] puts a reader or writer closure in front of another store.

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{Result, WechatError};

/// Entries expire this many seconds before the lifetime the platform reports
pub const EXPIRY_MARGIN_SECS: u64 = 2;

/// Key/value store with per-entry lifetime
pub trait CacheStore: Send + Sync {
    /// Read a live entry; expired or missing entries are `None`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write an entry that stays live for `lifetime`
    fn put(&self, key: &str, value: &str, lifetime: Duration) -> Result<()>;

    /// Drop an entry
    fn forget(&self, key: &str) -> Result<()>;
}

fn effective_lifetime(lifetime: Duration) -> Duration {
    lifetime.saturating_sub(Duration::from_secs(EXPIRY_MARGIN_SECS))
}

// =============================================================================
// File cache
// =============================================================================

/// On-disk entry
#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    token: String,
    /// Unix timestamp (seconds)
    expired_at: i64,
}

/// File-backed cache, one file per key
///
/// File names are `md5(app_id + key)` so several accounts can share a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    app_id: String,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, app_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            app_id: app_id.into(),
        }
    }

    /// Cache in the system temp directory
    pub fn in_temp_dir(app_id: impl Into<String>) -> Self {
        Self::new(std::env::temp_dir(), app_id)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    pub fn file_for(&self, key: &str) -> PathBuf {
        let digest = md5::compute(format!("{}{}", self.app_id, key));
        self.dir.join(format!("{:x}", digest))
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.file_for(key);

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("Unreadable cache file {:?}: {}", path, e);
                return Ok(None);
            }
        };

        let entry: FileEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Corrupt cache file {:?}: {}", path, e);
                return Ok(None);
            }
        };

        if entry.expired_at > Utc::now().timestamp() {
            debug!("Cache hit for {}", key);
            Ok(Some(entry.token))
        } else {
            debug!("Cache entry for {} expired", key);
            Ok(None)
        }
    }

    fn put(&self, key: &str, value: &str, lifetime: Duration) -> Result<()> {
        let entry = FileEntry {
            token: value.to_string(),
            expired_at: Utc::now().timestamp() + effective_lifetime(lifetime).as_secs() as i64,
        };

        let path = self.file_for(key);
        let data = serde_json::to_vec(&entry)?;

        std::fs::create_dir_all(&self.dir)
            .and_then(|_| std::fs::write(&path, data))
            .map_err(|e| {
                WechatError::Cache(format!("Failed to write access token cache {:?}: {}", path, e))
            })?;

        debug!("Cached {} in {:?}", key, path);
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.file_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Memory cache
// =============================================================================

/// In-process entry with expiry tracking
#[derive(Debug, Clone)]
struct CachedValue {
    value: String,
    expires_at: Instant,
}

impl CachedValue {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-process cache
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CachedValue>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.entries.read();
        Ok(guard
            .get(key)
            .filter(|cached| cached.is_valid())
            .map(|cached| cached.value.clone()))
    }

    fn put(&self, key: &str, value: &str, lifetime: Duration) -> Result<()> {
        let cached = CachedValue {
            value: value.to_string(),
            expires_at: Instant::now() + effective_lifetime(lifetime),
        };
        self.entries.write().insert(key.to_string(), cached);
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

// =============================================================================
// Closure cache
// =============================================================================

pub type CacheReader = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
pub type CacheWriter = Arc<dyn Fn(&str, Option<&str>, Duration) + Send + Sync>;

/// Cache backed by user-supplied closures
///
/// The writer receives `None` as value when an entry is forgotten.
#[derive(Clone)]
pub struct FnCache {
    reader: CacheReader,
    writer: CacheWriter,
}

impl FnCache {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: Fn(&str) -> Option<String> + Send + Sync + 'static,
        W: Fn(&str, Option<&str>, Duration) + Send + Sync + 'static,
    {
        Self {
            reader: Arc::new(reader),
            writer: Arc::new(writer),
        }
    }

}

impl std::fmt::Debug for FnCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCache").finish_non_exhaustive()
    }
}

impl CacheStore for FnCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok((self.reader)(key))
    }

    fn put(&self, key: &str, value: &str, lifetime: Duration) -> Result<()> {
        (self.writer)(key, Some(value), lifetime);
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<()> {
        (self.writer)(key, None, Duration::ZERO);
        Ok(())
    }
}

// =============================================================================
// Layered cache
// =============================================================================

/// Optional reader/writer closures over a base store
///
/// Whichever half has no closure goes to the base store, errors included.
#[derive(Clone)]
pub struct LayeredCache {
    reader: Option<CacheReader>,
    writer: Option<CacheWriter>,
    base: Arc<dyn CacheStore>,
}

impl LayeredCache {
    pub fn new(base: Arc<dyn CacheStore>) -> Self {
        Self {
            reader: None,
            writer: None,
            base,
        }
    }

    pub fn with_reader(mut self, reader: CacheReader) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_writer(mut self, writer: CacheWriter) -> Self {
        self.writer = Some(writer);
        self
    }
}

impl std::fmt::Debug for LayeredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredCache")
            .field("reader", &self.reader.is_some())
            .field("writer", &self.writer.is_some())
            .finish_non_exhaustive()
    }
}

impl CacheStore for LayeredCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match &self.reader {
            Some(reader) => Ok(reader(key)),
            None => self.base.get(key),
        }
    }

    fn put(&self, key: &str, value: &str, lifetime: Duration) -> Result<()> {
        match &self.writer {
            Some(writer) => {
                writer(key, Some(value), lifetime);
                Ok(())
            }
            None => self.base.put(key, value, lifetime),
        }
    }

    fn forget(&self, key: &str) -> Result<()> {
        match &self.writer {
            Some(writer) => {
                writer(key, None, Duration::ZERO);
                Ok(())
            }
            None => self.base.forget(key),
        }
    }
}
