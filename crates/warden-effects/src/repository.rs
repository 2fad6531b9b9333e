//! Community repository over key/value storage
//!
//! Rows are JSON documents under namespaced keys:
//!
//! - `community:{community}` – `CommunityConfig`
//! - `ban:{community}:{subject}` – ban row
//! - `mute:{community}:{subject}` – mute row, including the saved role list
//!
//! Network membership is answered by scanning the community rows; networks
//! are small and the scan only runs once per moderation command.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use warden_core::effects::{CommunityRepository, RepositoryError, StorageEffects};
use warden_core::{
    CommunityConfig, CommunityId, NetworkName, Punishment, PunishmentKey, PunishmentKind,
};

const COMMUNITY_PREFIX: &str = "community:";

/// `CommunityRepository` backed by any `StorageEffects` handler
#[derive(Clone)]
pub struct StorageCommunityRepository {
    storage: Arc<dyn StorageEffects>,
}

impl StorageCommunityRepository {
    /// Wrap a storage backend
    pub fn new(storage: Arc<dyn StorageEffects>) -> Self {
        Self { storage }
    }

    fn community_key(id: CommunityId) -> String {
        format!("{COMMUNITY_PREFIX}{id}")
    }

    fn punishment_prefix(kind: PunishmentKind) -> String {
        format!("{}:", kind.as_str())
    }

    fn punishment_key(key: &PunishmentKey) -> String {
        format!("{}:{}:{}", key.kind.as_str(), key.community, key.subject)
    }

    async fn read_row<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RepositoryError> {
        let Some(bytes) = self.storage.retrieve(key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| RepositoryError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn write_row<T: Serialize>(&self, key: &str, row: &T) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec(row).map_err(|e| RepositoryError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.storage.store(key, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl CommunityRepository for StorageCommunityRepository {
    async fn community(&self, id: CommunityId) -> Result<Option<CommunityConfig>, RepositoryError> {
        self.read_row(&Self::community_key(id)).await
    }

    async fn communities_in_network(
        &self,
        network: &NetworkName,
    ) -> Result<Vec<CommunityId>, RepositoryError> {
        let mut members: Vec<CommunityId> = self
            .communities()
            .await?
            .into_iter()
            .filter(|config| config.network.as_ref() == Some(network))
            .map(|config| config.id)
            .collect();
        members.sort();
        Ok(members)
    }

    async fn communities(&self) -> Result<Vec<CommunityConfig>, RepositoryError> {
        let keys = self.storage.list_keys(Some(COMMUNITY_PREFIX)).await?;
        let mut configs = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(config) = self.read_row::<CommunityConfig>(&key).await? {
                configs.push(config);
            }
        }
        Ok(configs)
    }

    async fn save_community(&self, config: &CommunityConfig) -> Result<(), RepositoryError> {
        self.write_row(&Self::community_key(config.id), config).await
    }

    async fn save_punishment(&self, punishment: &Punishment) -> Result<(), RepositoryError> {
        self.write_row(&Self::punishment_key(&punishment.key()), punishment)
            .await
    }

    async fn punishment(&self, key: &PunishmentKey) -> Result<Option<Punishment>, RepositoryError> {
        self.read_row(&Self::punishment_key(key)).await
    }

    async fn delete_punishment(&self, key: &PunishmentKey) -> Result<bool, RepositoryError> {
        Ok(self.storage.remove(&Self::punishment_key(key)).await?)
    }

    async fn load_punishments(&self) -> Result<Vec<Punishment>, RepositoryError> {
        let mut rows = Vec::new();
        for kind in [PunishmentKind::Ban, PunishmentKind::Mute] {
            for key in self
                .storage
                .list_keys(Some(&Self::punishment_prefix(kind)))
                .await?
            {
                match self.read_row::<Punishment>(&key).await {
                    Ok(Some(row)) if row.kind() == kind => rows.push(row),
                    Ok(Some(row)) => {
                        warn!(key, kind = %row.kind(), "Punishment row stored under wrong kind");
                    }
                    Ok(None) => {}
                    // One undecodable row must not hide the rest.
                    Err(RepositoryError::Corrupt { key, reason }) => {
                        warn!(%key, %reason, "Skipping corrupt punishment row");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorageHandler;
    use warden_core::{RoleId, UserId};

    fn repository() -> StorageCommunityRepository {
        StorageCommunityRepository::new(Arc::new(MemoryStorageHandler::new()))
    }

    #[tokio::test]
    async fn test_network_membership_scan() {
        let repo = repository();
        let hub = NetworkName::new("hub").unwrap();
        let other = NetworkName::new("other").unwrap();

        repo.save_community(&CommunityConfig::new(CommunityId::new(3)).with_network(hub.clone()))
            .await
            .unwrap();
        repo.save_community(&CommunityConfig::new(CommunityId::new(1)).with_network(hub.clone()))
            .await
            .unwrap();
        repo.save_community(&CommunityConfig::new(CommunityId::new(2)).with_network(other))
            .await
            .unwrap();
        repo.save_community(&CommunityConfig::new(CommunityId::new(4)))
            .await
            .unwrap();

        assert_eq!(
            repo.communities_in_network(&hub).await.unwrap(),
            vec![CommunityId::new(1), CommunityId::new(3)]
        );
        assert_eq!(repo.communities().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_punishment_rows_keyed_by_kind() {
        let repo = repository();
        let ban = Punishment::ban(UserId::new(7), CommunityId::new(1), "spam", None);
        let mute = Punishment::mute(
            UserId::new(7),
            CommunityId::new(1),
            "spam",
            None,
            vec![RoleId::new(11)],
        );
        repo.save_punishment(&ban).await.unwrap();
        repo.save_punishment(&mute).await.unwrap();

        let mut loaded = repo.load_punishments().await.unwrap();
        loaded.sort_by_key(|p| p.kind());
        assert_eq!(loaded, vec![ban.clone(), mute.clone()]);

        assert!(repo.delete_punishment(&ban.key()).await.unwrap());
        assert!(!repo.delete_punishment(&ban.key()).await.unwrap());
        assert_eq!(repo.punishment(&mute.key()).await.unwrap(), Some(mute));
    }

    #[tokio::test]
    async fn test_corrupt_row_reported() {
        let storage = Arc::new(MemoryStorageHandler::new());
        storage.store("community:9", b"not json".to_vec()).await.unwrap();
        let repo = StorageCommunityRepository::new(storage);

        let err = repo.community(CommunityId::new(9)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_load_punishments_skips_corrupt_rows() {
        let storage = Arc::new(MemoryStorageHandler::new());
        let repo = StorageCommunityRepository::new(storage.clone());
        let ban = Punishment::ban(UserId::new(7), CommunityId::new(1), "spam", None);
        repo.save_punishment(&ban).await.unwrap();
        storage.store("ban:99:7", b"not json".to_vec()).await.unwrap();

        assert_eq!(repo.load_punishments().await.unwrap(), vec![ban]);
    }
}
