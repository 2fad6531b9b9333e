//! Community repository with injectable storage failures
//!
//! Delegates to a real repository until told to fail writes, deletes or the
//! bulk load, mirroring `MockPlatform::deny` / `make_unavailable`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use warden_core::{
    CommunityConfig, CommunityId, CommunityRepository, NetworkName, Punishment, PunishmentKey,
    RepositoryError, StorageError,
};

#[derive(Debug, Default)]
struct Faults {
    saves: HashSet<CommunityId>,
    deletes: HashSet<CommunityId>,
    loads: bool,
}

/// `CommunityRepository` wrapper that fails chosen operations
pub struct FaultyRepository {
    inner: Arc<dyn CommunityRepository>,
    faults: Mutex<Faults>,
}

impl FaultyRepository {
    /// Wrap `inner`, passing every call through
    pub fn new(inner: Arc<dyn CommunityRepository>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Fail punishment writes in `community`
    pub fn fail_saves(&self, community: CommunityId) {
        self.faults.lock().saves.insert(community);
    }

    /// Fail punishment deletes in `community`
    pub fn fail_deletes(&self, community: CommunityId) {
        self.faults.lock().deletes.insert(community);
    }

    /// Fail `load_punishments`
    pub fn fail_loads(&self) {
        self.faults.lock().loads = true;
    }

    /// Clear every injected failure
    pub fn heal(&self) {
        *self.faults.lock() = Faults::default();
    }
}

#[async_trait]
impl CommunityRepository for FaultyRepository {
    async fn community(&self, id: CommunityId) -> Result<Option<CommunityConfig>, RepositoryError> {
        self.inner.community(id).await
    }

    async fn communities_in_network(
        &self,
        network: &NetworkName,
    ) -> Result<Vec<CommunityId>, RepositoryError> {
        self.inner.communities_in_network(network).await
    }

    async fn communities(&self) -> Result<Vec<CommunityConfig>, RepositoryError> {
        self.inner.communities().await
    }

    async fn save_community(&self, config: &CommunityConfig) -> Result<(), RepositoryError> {
        self.inner.save_community(config).await
    }

    async fn save_punishment(&self, punishment: &Punishment) -> Result<(), RepositoryError> {
        if self.faults.lock().saves.contains(&punishment.community) {
            return Err(StorageError::WriteFailed("disk full".into()).into());
        }
        self.inner.save_punishment(punishment).await
    }

    async fn punishment(&self, key: &PunishmentKey) -> Result<Option<Punishment>, RepositoryError> {
        self.inner.punishment(key).await
    }

    async fn delete_punishment(&self, key: &PunishmentKey) -> Result<bool, RepositoryError> {
        if self.faults.lock().deletes.contains(&key.community) {
            return Err(StorageError::DeleteFailed("disk unavailable".into()).into());
        }
        self.inner.delete_punishment(key).await
    }

    async fn load_punishments(&self) -> Result<Vec<Punishment>, RepositoryError> {
        if self.faults.lock().loads {
            return Err(StorageError::ListFailed("disk unavailable".into()).into());
        }
        self.inner.load_punishments().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::UserId;
    use warden_effects::{MemoryStorageHandler, StorageCommunityRepository};

    #[tokio::test]
    async fn test_faults_apply_per_community_until_healed() {
        let inner = Arc::new(StorageCommunityRepository::new(Arc::new(
            MemoryStorageHandler::new(),
        )));
        let repo = FaultyRepository::new(inner);
        let a = Punishment::ban(UserId::new(1), CommunityId::new(1), "spam", None);
        let b = Punishment::ban(UserId::new(1), CommunityId::new(2), "spam", None);
        repo.fail_saves(CommunityId::new(2));

        repo.save_punishment(&a).await.unwrap();
        assert!(repo.save_punishment(&b).await.is_err());

        repo.heal();
        repo.save_punishment(&b).await.unwrap();
        assert_eq!(repo.load_punishments().await.unwrap().len(), 2);
    }
}
