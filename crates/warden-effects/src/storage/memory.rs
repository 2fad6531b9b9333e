//! In-memory storage handler
//!
//! Contents live as long as the process. Used for dry runs and as the default
//! backend of the test harness.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use warden_core::effects::{StorageEffects, StorageError};

/// In-memory storage handler
#[derive(Debug, Clone, Default)]
pub struct MemoryStorageHandler {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorageHandler {
    /// Create a new memory storage handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl StorageEffects for MemoryStorageHandler {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), value);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut data = self.data.write().await;
        Ok(data.remove(key).is_some())
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().await;
        let keys = if let Some(prefix) = prefix {
            data.keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect()
        } else {
            data.keys().cloned().collect()
        };
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let data = self.data.read().await;
        Ok(data.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefix_listing() {
        let storage = MemoryStorageHandler::new();
        storage.store("ban:1:2", b"a".to_vec()).await.unwrap();
        storage.store("mute:1:2", b"b".to_vec()).await.unwrap();

        let bans = storage.list_keys(Some("ban:")).await.unwrap();
        assert_eq!(bans, vec!["ban:1:2".to_string()]);
        assert_eq!(storage.list_keys(None).await.unwrap().len(), 2);

        assert!(storage.remove("ban:1:2").await.unwrap());
        assert!(!storage.remove("ban:1:2").await.unwrap());
        assert!(!storage.exists("ban:1:2").await.unwrap());
    }
}
