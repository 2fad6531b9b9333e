//! Key/value storage effect

use async_trait::async_trait;
use std::sync::Arc;

/// Error type for storage operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Reading a key failed
    #[error("Read failed: {0}")]
    ReadFailed(String),
    /// Writing a key failed
    #[error("Write failed: {0}")]
    WriteFailed(String),
    /// Deleting a key failed
    #[error("Delete failed: {0}")]
    DeleteFailed(String),
    /// Listing keys failed
    #[error("List failed: {0}")]
    ListFailed(String),
    /// Key cannot be stored by this backend
    #[error("Invalid key: {reason}")]
    InvalidKey {
        /// Why the key was rejected
        reason: String,
    },
    /// Backend could not be set up
    #[error("Configuration error: {reason}")]
    ConfigurationError {
        /// What went wrong
        reason: String,
    },
}

/// Byte-oriented key/value storage
#[async_trait]
pub trait StorageEffects: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Fetch the value under `key`
    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove `key`, returning whether it existed
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// List keys, optionally restricted to those starting with `prefix`
    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError>;

    /// Whether `key` exists
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.retrieve(key).await?.is_some())
    }
}

#[async_trait]
impl<T: StorageEffects + ?Sized> StorageEffects for Arc<T> {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        (**self).store(key, value).await
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).retrieve(key).await
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        (**self).remove(key).await
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        (**self).list_keys(prefix).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        (**self).exists(key).await
    }
}
