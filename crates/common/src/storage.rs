//! Object storage abstraction for uploaded media.
//!
//! Objects are written through a [`StorageBackend`]. Reads from outside go
//! through signed URLs issued by [`StorageService`], which the files endpoint
//! verifies before serving the object.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::crypto::{hmac_sha256_hex, verify_hmac_sha256_hex};
use crate::{AppError, AppResult};

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Storage key (path relative to the storage root).
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write an object, replacing any existing object under the key.
    async fn save(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredObject>;

    /// Read an object.
    async fn load(&self, key: &str) -> AppResult<Vec<u8>>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(AppError::BadRequest(format!("Invalid storage key: {key}")));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn save(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredObject> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;

        Ok(StoredObject {
            key: key.to_string(),
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    async fn load(&self, key: &str) -> AppResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("File not found: {key}")))
            }
            Err(e) => Err(AppError::Storage(format!("Failed to read file: {e}"))),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {e}"))),
        }
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to stat file: {e}")))
    }
}

/// In-memory storage backend.
///
/// Used by tests and local demos. Writes, deletes and reads of single keys
/// can be made to fail to exercise partial failure handling.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    failing_keys: Mutex<HashSet<String>>,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every following delete fail.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make reads and deletes of one key fail.
    pub fn fail_key(&self, key: &str) {
        if let Ok(mut keys) = self.failing_keys.lock() {
            keys.insert(key.to_string());
        }
    }

    /// Keys currently stored, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn is_failing(&self, key: &str) -> bool {
        self.failing_keys
            .lock()
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, String)>>> {
        self.objects
            .lock()
            .map_err(|_| AppError::Storage("Memory storage lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryStorage {
    async fn save(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredObject> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!("Write rejected: {key}")));
        }
        self.lock()?
            .insert(key.to_string(), (data.to_vec(), content_type.to_string()));
        Ok(StoredObject {
            key: key.to_string(),
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    async fn load(&self, key: &str) -> AppResult<Vec<u8>> {
        if self.is_failing(key) {
            return Err(AppError::Storage(format!("Read rejected: {key}")));
        }
        self.lock()?
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| AppError::NotFound(format!("File not found: {key}")))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) || self.is_failing(key) {
            return Err(AppError::Storage(format!("Delete rejected: {key}")));
        }
        self.lock()?.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.lock()?.contains_key(key))
    }
}

/// Storage facade that issues and verifies signed URLs.
#[derive(Clone)]
pub struct StorageService {
    backend: Arc<dyn StorageBackend>,
    signing_secret: Arc<str>,
    files_url: String,
    default_ttl: Duration,
}

impl StorageService {
    /// Create a new storage service.
    ///
    /// `files_url` is the public base under which the files endpoint is
    /// mounted, e.g. `https://wall.example.com/files`.
    #[must_use]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        signing_secret: &str,
        files_url: &str,
        default_ttl: Duration,
    ) -> Self {
        Self {
            backend,
            signing_secret: Arc::from(signing_secret),
            files_url: files_url.trim_end_matches('/').to_string(),
            default_ttl,
        }
    }

    /// Lifetime of URLs issued for uploads.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Write an object.
    pub async fn save(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredObject> {
        self.backend.save(key, data, content_type).await
    }

    /// Read an object.
    pub async fn load(&self, key: &str) -> AppResult<Vec<u8>> {
        self.backend.load(key).await
    }

    /// Delete an object.
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        self.backend.delete(key).await
    }

    /// Issue a signed URL for an existing object.
    pub async fn signed_url(&self, key: &str, ttl: Duration) -> AppResult<String> {
        if !self.backend.exists(key).await? {
            return Err(AppError::NotFound(format!("File not found: {key}")));
        }
        let ttl = i64::try_from(ttl.as_secs())
            .map_err(|_| AppError::Internal("Signed URL lifetime out of range".to_string()))?;
        let expires = Utc::now()
            .timestamp()
            .checked_add(ttl)
            .ok_or_else(|| AppError::Internal("Signed URL lifetime out of range".to_string()))?;
        Ok(self.signed_url_until(key, expires))
    }

    /// Signed URL valid until the given unix timestamp.
    #[must_use]
    pub fn signed_url_until(&self, key: &str, expires: i64) -> String {
        let signature = self.signature(key, expires);
        format!(
            "{}/{key}?expires={expires}&signature={signature}",
            self.files_url
        )
    }

    /// Check a signature and expiry taken from a signed URL.
    #[must_use]
    pub fn verify(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        verify_hmac_sha256_hex(
            self.signing_secret.as_bytes(),
            Self::signed_message(key, expires).as_bytes(),
            signature,
        )
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        hmac_sha256_hex(
            self.signing_secret.as_bytes(),
            Self::signed_message(key, expires).as_bytes(),
        )
    }

    fn signed_message(key: &str, expires: i64) -> String {
        format!("{key}\n{expires}")
    }
}

/// Generate a unique storage key for a file, namespaced by event code.
#[must_use]
pub fn generate_storage_key(event_code: &str, original_name: &str) -> String {
    let timestamp = Utc::now().timestamp_millis();

    let extension = original_name
        .rfind('.')
        .filter(|&pos| pos > 0 && pos < original_name.len() - 1)
        .map(|pos| &original_name[pos + 1..])
        .filter(|ext| ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase);

    format!(
        "{}/{}_{}.{}",
        event_code,
        timestamp,
        uuid::Uuid::new_v4().simple(),
        extension
    )
}

/// Guess the content type of a stored object from its key.
#[must_use]
pub fn content_type_for_key(key: &str) -> &'static str {
    let extension = key
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "avif" => "image/avif",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "zip" => "application/zip",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
