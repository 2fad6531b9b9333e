//! Community repository
//!
//! Typed access to community configuration and persisted punishment rows.
//! The engine reads configuration and writes punishment rows; configuration
//! writes come from the administration surface.

use super::storage::StorageError;
use crate::community::CommunityConfig;
use crate::identifiers::{CommunityId, NetworkName};
use crate::punishment::{Punishment, PunishmentKey};
use async_trait::async_trait;

/// Error type for repository operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The underlying storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A stored row could not be decoded
    #[error("corrupt row {key}: {reason}")]
    Corrupt {
        /// Storage key of the row
        key: String,
        /// Decoder message
        reason: String,
    },
    /// A row could not be encoded
    #[error("failed to encode row {key}: {reason}")]
    Encode {
        /// Storage key of the row
        key: String,
        /// Encoder message
        reason: String,
    },
}

/// Persistence for community configuration and punishments
#[async_trait]
pub trait CommunityRepository: Send + Sync {
    /// Configuration of `id`; `None` when the community was never configured
    async fn community(&self, id: CommunityId) -> Result<Option<CommunityConfig>, RepositoryError>;

    /// Every community whose network is `network`
    async fn communities_in_network(
        &self,
        network: &NetworkName,
    ) -> Result<Vec<CommunityId>, RepositoryError>;

    /// Every configured community
    async fn communities(&self) -> Result<Vec<CommunityConfig>, RepositoryError>;

    /// Insert or replace a configuration row
    async fn save_community(&self, config: &CommunityConfig) -> Result<(), RepositoryError>;

    /// Insert or replace a punishment row
    async fn save_punishment(&self, punishment: &Punishment) -> Result<(), RepositoryError>;

    /// Fetch one punishment row
    async fn punishment(&self, key: &PunishmentKey) -> Result<Option<Punishment>, RepositoryError>;

    /// Delete a punishment row, returning whether it existed
    async fn delete_punishment(&self, key: &PunishmentKey) -> Result<bool, RepositoryError>;

    /// Every persisted punishment row
    async fn load_punishments(&self) -> Result<Vec<Punishment>, RepositoryError>;
}
