//! Chat platform gateway effect
//!
//! The engine's only view of the platform. Every call classifies its failure
//! into one of three outcomes the fan-out executor knows how to handle.

use crate::identifiers::{CommunityId, RoleId, UserId};
use async_trait::async_trait;
use std::sync::Arc;

/// Classified platform failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The community has no such member
    #[error("subject is not a member of the community")]
    SubjectAbsent,
    /// The bot's rank or permissions do not allow the action
    #[error("permission denied: {reason}")]
    PermissionDenied {
        /// Platform-supplied explanation
        reason: String,
    },
    /// Any other failure: network, rate limit, platform outage
    #[error("platform unavailable: {reason}")]
    Unavailable {
        /// Platform-supplied explanation
        reason: String,
    },
}

impl PlatformError {
    /// Create a permission denied error
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Moderation operations on the chat platform
#[async_trait]
pub trait PlatformEffects: Send + Sync {
    /// Ban `subject` from `community`
    async fn ban(
        &self,
        community: CommunityId,
        subject: UserId,
        reason: &str,
    ) -> Result<(), PlatformError>;

    /// Lift a ban of `subject` in `community`
    async fn unban(&self, community: CommunityId, subject: UserId) -> Result<(), PlatformError>;

    /// Kick `subject` from `community`
    async fn kick(
        &self,
        community: CommunityId,
        subject: UserId,
        reason: &str,
    ) -> Result<(), PlatformError>;

    /// Roles `subject` currently holds in `community`, in platform order
    async fn member_roles(
        &self,
        community: CommunityId,
        subject: UserId,
    ) -> Result<Vec<RoleId>, PlatformError>;

    /// Replace every role `subject` holds in `community` with `roles`
    async fn set_member_roles(
        &self,
        community: CommunityId,
        subject: UserId,
        roles: &[RoleId],
    ) -> Result<(), PlatformError>;

    /// Whether `subject` is currently a member of `community`
    async fn is_member(&self, community: CommunityId, subject: UserId)
        -> Result<bool, PlatformError>;

    /// Whether `subject` is currently banned from `community`
    async fn is_banned(&self, community: CommunityId, subject: UserId)
        -> Result<bool, PlatformError>;
}

#[async_trait]
impl<T: PlatformEffects + ?Sized> PlatformEffects for Arc<T> {
    async fn ban(
        &self,
        community: CommunityId,
        subject: UserId,
        reason: &str,
    ) -> Result<(), PlatformError> {
        (**self).ban(community, subject, reason).await
    }

    async fn unban(&self, community: CommunityId, subject: UserId) -> Result<(), PlatformError> {
        (**self).unban(community, subject).await
    }

    async fn kick(
        &self,
        community: CommunityId,
        subject: UserId,
        reason: &str,
    ) -> Result<(), PlatformError> {
        (**self).kick(community, subject, reason).await
    }

    async fn member_roles(
        &self,
        community: CommunityId,
        subject: UserId,
    ) -> Result<Vec<RoleId>, PlatformError> {
        (**self).member_roles(community, subject).await
    }

    async fn set_member_roles(
        &self,
        community: CommunityId,
        subject: UserId,
        roles: &[RoleId],
    ) -> Result<(), PlatformError> {
        (**self).set_member_roles(community, subject, roles).await
    }

    async fn is_member(
        &self,
        community: CommunityId,
        subject: UserId,
    ) -> Result<bool, PlatformError> {
        (**self).is_member(community, subject).await
    }

    async fn is_banned(
        &self,
        community: CommunityId,
        subject: UserId,
    ) -> Result<bool, PlatformError> {
        (**self).is_banned(community, subject).await
    }
}
