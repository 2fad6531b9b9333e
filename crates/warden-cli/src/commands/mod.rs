// Command modules for the CLI

/// Moderation log channel settings
pub mod mod_log;

/// Mute role settings
pub mod mute_role;

/// Moderation network membership
pub mod network;

/// Punishment inspection
pub mod punishments;

pub use mod_log::ModLogCommand;
pub use mute_role::MuteRoleCommand;
pub use network::NetworkCommand;
pub use punishments::PunishmentsCommand;

use warden_core::{CommunityConfig, CommunityId, CommunityRepository, RepositoryError};

/// Stored configuration of `community`, or a blank one if it was never configured
pub async fn community_or_default(
    repository: &dyn CommunityRepository,
    community: CommunityId,
) -> Result<CommunityConfig, RepositoryError> {
    Ok(repository
        .community(community)
        .await?
        .unwrap_or_else(|| CommunityConfig::new(community)))
}

/// Apply `edit` to the stored configuration of `community` and save it
pub async fn update_community(
    repository: &dyn CommunityRepository,
    community: CommunityId,
    edit: impl FnOnce(&mut CommunityConfig),
) -> Result<CommunityConfig, RepositoryError> {
    let mut config = community_or_default(repository, community).await?;
    edit(&mut config);
    repository.save_community(&config).await?;
    Ok(config)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use warden_effects::{MemoryStorageHandler, StorageCommunityRepository};

    pub fn repository() -> StorageCommunityRepository {
        StorageCommunityRepository::new(Arc::new(MemoryStorageHandler::new()))
    }
}
