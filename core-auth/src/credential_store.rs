//! Credential Persistence
//!
//! Durable storage for exactly one credential record.
//!
//! ## Storage format
//!
//! The record is a single JSON object:
//!
//! ```json
//! { "authToken": "...", "issuedAt": 1709294400000, "endPoint": "https://..." }
//! ```
//!
//! `issuedAt` is milliseconds since the Unix epoch. A missing file means "no
//! credential". A file that fails to parse is logged, deleted and also treated
//! as absent, so a damaged store costs one extra login instead of blocking
//! every run.
//!
//! Concurrent processes sharing one storage path are not coordinated.

use crate::error::{AuthError, Result};
use crate::types::Credential;
use async_trait::async_trait;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Read/write/clear for a single persisted credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns `Ok(None)` when nothing usable is stored.
    async fn load(&self) -> Result<Option<Credential>>;

    async fn save(&self, credential: &Credential) -> Result<()>;

    /// Removing an absent record is not an error.
    async fn clear(&self) -> Result<()>;
}

/// On-disk representation of a [`Credential`].
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    #[serde(rename = "authToken")]
    auth_token: String,
    #[serde(rename = "issuedAt", with = "chrono::serde::ts_milliseconds")]
    issued_at: DateTime<Utc>,
    #[serde(rename = "endPoint")]
    end_point: String,
}

impl From<&Credential> for StoredCredential {
    fn from(credential: &Credential) -> Self {
        Self {
            auth_token: credential.token().to_string(),
            issued_at: credential.issued_at(),
            end_point: credential.endpoint().to_string(),
        }
    }
}

/// JSON file store at a fixed path.
#[derive(Clone)]
pub struct FileCredentialStore {
    fs: Arc<dyn FileSystemAccess>,
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(fs: Arc<dyn FileSystemAccess>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn discard_corrupted(&self, reason: &str) {
        warn!(
            path = ?self.path,
            error = %reason,
            "Stored credential is corrupted, discarding it"
        );

        if let Err(e) = self.fs.delete_file(&self.path).await {
            warn!(path = ?self.path, error = %e, "Failed to delete corrupted credential");
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credential>> {
        let exists = self
            .fs
            .exists(&self.path)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        if !exists {
            debug!(path = ?self.path, "No stored credential");
            return Ok(None);
        }

        let data = self
            .fs
            .read_file(&self.path)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        let stored: StoredCredential = match serde_json::from_slice(&data) {
            Ok(stored) => stored,
            Err(e) => {
                self.discard_corrupted(&e.to_string()).await;
                return Ok(None);
            }
        };

        match Credential::new(stored.auth_token, stored.issued_at, stored.end_point) {
            Some(credential) => {
                debug!(path = ?self.path, issued_at = %credential.issued_at(), "Loaded stored credential");
                Ok(Some(credential))
            }
            None => {
                self.discard_corrupted("empty auth token").await;
                Ok(None)
            }
        }
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        let json = serde_json::to_vec_pretty(&StoredCredential::from(credential))
            .map_err(|e| AuthError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs
                .create_dir_all(parent)
                .await
                .map_err(|e| AuthError::Storage(e.to_string()))?;
        }

        self.fs
            .write_file(&self.path, Bytes::from(json))
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        info!(path = ?self.path, "Persisted credential");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.fs
            .delete_file(&self.path)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        info!(path = ?self.path, "Cleared stored credential");
        Ok(())
    }
}

/// Process-local store, for tests and embedders that do not want a file.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credential>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        *self.slot.lock().await = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.slot.lock().await.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;
    use chrono::{Duration, TimeZone};
    use std::env;

    fn scratch_path(name: &str) -> PathBuf {
        env::temp_dir()
            .join(format!("core-auth-{}-{}", name, std::process::id()))
            .join("credential.json")
    }

    fn store_at(path: &Path) -> FileCredentialStore {
        FileCredentialStore::new(Arc::new(TokioFileSystem::new()), path)
    }

    fn sample_credential() -> Credential {
        let issued = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
            + Duration::nanoseconds(987_654_321);
        Credential::new("token-abc", issued, "https://api.example.com").unwrap()
    }

    async fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let path = scratch_path("round-trip");
        let store = store_at(&path);
        let credential = sample_credential();

        store.save(&credential).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded, Some(credential));
        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_absent() {
        let path = scratch_path("missing");
        assert_eq!(store_at(&path).load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_uses_wire_field_names() {
        let path = scratch_path("wire");
        let store = store_at(&path);
        store.save(&sample_credential()).await.unwrap();

        let raw = tokio::fs::read(&path).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["authToken"], "token-abc");
        assert_eq!(json["endPoint"], "https://api.example.com");
        assert!(json["issuedAt"].is_i64());

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_corrupted_file_is_discarded() {
        let path = scratch_path("corrupted");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = store_at(&path);
        assert_eq!(store.load().await.unwrap(), None);
        assert!(!path.exists());

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_clear_removes_file_and_is_idempotent() {
        let path = scratch_path("clear");
        let store = store_at(&path);
        store.save(&sample_credential()).await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();

        cleanup(&path).await;
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryCredentialStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        store.save(&sample_credential()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sample_credential()));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
