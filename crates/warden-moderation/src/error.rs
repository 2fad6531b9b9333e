//! Moderation engine errors
//!
//! One enum for everything the engine can fail with. Fan-out classifies
//! platform failures through `ModerationError::from_platform`, and every
//! variant maps onto exactly one terse user-facing reply.

use crate::registry::RegistryError;
use crate::scheduler::SchedulerError;
use warden_core::effects::{PlatformError, RepositoryError, TimeError};
use warden_core::{CommunityId, InvokerReply, PunishmentKind, UserId};

/// Errors surfaced by the moderation engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModerationError {
    /// The subject already has an active punishment of this kind
    #[error("{subject} already has an active {kind} in community {community}")]
    AlreadyPunished {
        /// Kind already active
        kind: PunishmentKind,
        /// Punished user
        subject: UserId,
        /// Community holding the punishment
        community: CommunityId,
    },

    /// The request is malformed (bad duration, expiry in the past)
    #[error("Invalid request: {reason}")]
    Validation {
        /// One-sentence explanation shown to the invoker
        reason: String,
    },

    /// The bot lacks the rank or permission to act in a community
    #[error("Insufficient authority in community {community}: {reason}")]
    Authority {
        /// Community that refused the action
        community: CommunityId,
        /// Platform-provided detail
        reason: String,
    },

    /// The subject is not present in the target community
    #[error("Subject is not present in community {community}")]
    AbsentSubject {
        /// Community the subject is missing from
        community: CommunityId,
    },

    /// Reading or writing persisted rows failed
    #[error("Persistence failure: {0}")]
    Persistence(#[from] RepositoryError),

    /// The platform could not be reached or failed unexpectedly
    #[error("Platform failure in community {community}: {reason}")]
    Platform {
        /// Community the call targeted
        community: CommunityId,
        /// Platform-provided detail
        reason: String,
    },

    /// An expiry job could not be scheduled or cancelled
    #[error("Scheduler failure: {0}")]
    Scheduler(#[from] SchedulerError),

    /// The clock could not be read
    #[error("Clock failure: {0}")]
    Time(#[from] TimeError),
}

impl ModerationError {
    /// Classify a platform failure against the community it targeted
    pub fn from_platform(community: CommunityId, error: PlatformError) -> Self {
        match error {
            PlatformError::SubjectAbsent => ModerationError::AbsentSubject { community },
            PlatformError::PermissionDenied { reason } => {
                ModerationError::Authority { community, reason }
            }
            PlatformError::Unavailable { reason } => {
                ModerationError::Platform { community, reason }
            }
        }
    }

    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        ModerationError::Validation {
            reason: reason.into(),
        }
    }

    /// Whether this failure is recovered locally by skipping the target
    pub fn is_benign(&self) -> bool {
        matches!(self, ModerationError::AbsentSubject { .. })
    }

    /// The reply the invoker sees for this failure
    pub fn reply(&self) -> InvokerReply {
        match self {
            ModerationError::AlreadyPunished { kind, subject, .. } => {
                InvokerReply::AlreadyPunished {
                    kind: *kind,
                    subject: *subject,
                }
            }
            ModerationError::Validation { reason } => InvokerReply::Invalid {
                message: reason.clone(),
            },
            ModerationError::Authority { community, .. } => InvokerReply::InsufficientAuthority {
                community: *community,
            },
            ModerationError::AbsentSubject { .. }
            | ModerationError::Persistence(_)
            | ModerationError::Platform { .. }
            | ModerationError::Scheduler(_)
            | ModerationError::Time(_) => InvokerReply::InternalError,
        }
    }
}

impl From<RegistryError> for ModerationError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::AlreadyActive(key) => ModerationError::AlreadyPunished {
                kind: key.kind,
                subject: key.subject,
                community: key.community,
            },
        }
    }
}
