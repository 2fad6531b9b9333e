//! Filesystem storage handler
//!
//! One file per key under a base directory. File names are the hex encoding
//! of the key so that arbitrary keys map to safe names and can be recovered
//! when listing. Writes go to a temporary file first and are renamed into
//! place so a crash never leaves a half-written row behind.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use warden_core::effects::{StorageEffects, StorageError};

const DATA_EXTENSION: &str = "dat";
const TEMP_EXTENSION: &str = "tmp";
// Hex encoding doubles the length; keep file names under the 255 byte limit.
const MAX_KEY_LEN: usize = 120;

/// Filesystem-backed storage handler
#[derive(Debug, Clone)]
pub struct FilesystemStorageHandler {
    base_path: PathBuf,
}

impl FilesystemStorageHandler {
    /// Open (creating if needed) storage rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path).map_err(|e| StorageError::ConfigurationError {
            reason: format!("Failed to create storage directory {}: {e}", base_path.display()),
        })?;
        info!(path = %base_path.display(), "Initialized filesystem storage");
        Ok(Self { base_path })
    }

    /// Directory holding the data files
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn validate_key(key: &str) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey {
                reason: "Key cannot be empty".to_string(),
            });
        }
        if key.len() > MAX_KEY_LEN {
            return Err(StorageError::InvalidKey {
                reason: format!("Key too long (max {MAX_KEY_LEN} bytes)"),
            });
        }
        Ok(())
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.{DATA_EXTENSION}", hex::encode(key.as_bytes())))
    }

    fn path_to_key(path: &Path) -> Option<String> {
        if path.extension()?.to_str()? != DATA_EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let bytes = hex::decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }
}

#[async_trait]
impl StorageEffects for FilesystemStorageHandler {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        Self::validate_key(key)?;
        let path = self.key_to_path(key);
        let temp_path = path.with_extension(TEMP_EXTENSION);

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("{key}: {e}")))?;
        file.write_all(&value)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("{key}: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::WriteFailed(format!("{key}: {e}")))?;
        drop(file);

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("{key}: {e}")))?;
        debug!(key, bytes = value.len(), "Stored key");
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Self::validate_key(key)?;
        match fs::read(self.key_to_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed(format!("{key}: {e}"))),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Self::validate_key(key)?;
        match fs::remove_file(self.key_to_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!("{key}: {e}"))),
        }
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?
        {
            let Some(key) = Self::path_to_key(&entry.path()) else {
                continue;
            };
            if prefix.map_or(true, |p| key.starts_with(p)) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Self::validate_key(key)?;
        fs::try_exists(self.key_to_path(key))
            .await
            .map_err(|e| StorageError::ReadFailed(format!("{key}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_retrieve_and_list_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::new(dir.path()).unwrap();

        storage
            .store("mute:10:20", b"{\"reason\":\"spam\"}".to_vec())
            .await
            .unwrap();
        storage.store("community:10", b"{}".to_vec()).await.unwrap();

        let reopened = FilesystemStorageHandler::new(dir.path()).unwrap();
        assert_eq!(
            reopened.retrieve("mute:10:20").await.unwrap().unwrap(),
            b"{\"reason\":\"spam\"}".to_vec()
        );
        assert_eq!(
            reopened.list_keys(Some("mute:")).await.unwrap(),
            vec!["mute:10:20".to_string()]
        );
        assert!(reopened.exists("community:10").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_key_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::new(dir.path()).unwrap();

        assert_eq!(storage.retrieve("ban:1:1").await.unwrap(), None);
        assert!(!storage.remove("ban:1:1").await.unwrap());

        storage.store("ban:1:1", vec![1]).await.unwrap();
        assert!(storage.remove("ban:1:1").await.unwrap());
        assert!(storage.list_keys(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::new(dir.path()).unwrap();
        assert!(matches!(
            storage.store("", vec![]).await,
            Err(StorageError::InvalidKey { .. })
        ));
    }
}
