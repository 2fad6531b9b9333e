//! Reconciliation of tracked punishments
//!
//! Two triggers end a tracked punishment: an unpunish event (manual command
//! or expiry job) and a removal the platform reports on its own. Both cancel
//! the expiry job, delete the row and drop the registry entry, in that order
//! and under the key's lock. Only an unpunish event reverses the restriction
//! on the platform; an external removal already did. A row that cannot be
//! deleted does not keep the entry alive.

use crate::error::ModerationError;
use crate::registry::PunishmentRegistry;
use crate::scheduler::ExpiryScheduler;
use std::sync::Arc;
use tracing::{debug, info, warn};
use warden_core::{
    CommunityRepository, PlatformEffects, PlatformError, Punishment, PunishmentKey, PunishmentKind,
};

/// What ended the punishment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileTrigger {
    /// An `unban` / `unmute` event: reverse on the platform
    Unpunish,
    /// The platform reports the restriction already gone
    ExternalRemoval,
}

/// Result of a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing was tracked under the key
    Untracked,
    /// The entry was cleared
    Reconciled {
        /// Whether a platform reversal was issued and took effect
        reversed: bool,
    },
}

/// Clears tracked punishments and reverses them when asked
#[derive(Clone)]
pub struct Reconciler {
    platform: Arc<dyn PlatformEffects>,
    repository: Arc<dyn CommunityRepository>,
    registry: Arc<PunishmentRegistry>,
    scheduler: Arc<ExpiryScheduler>,
}

impl Reconciler {
    /// Create a reconciler over the engine's collaborators
    pub fn new(
        platform: Arc<dyn PlatformEffects>,
        repository: Arc<dyn CommunityRepository>,
        registry: Arc<PunishmentRegistry>,
        scheduler: Arc<ExpiryScheduler>,
    ) -> Self {
        Self {
            platform,
            repository,
            registry,
            scheduler,
        }
    }

    /// End the punishment tracked under `key`
    pub async fn reconcile(
        &self,
        key: PunishmentKey,
        trigger: ReconcileTrigger,
    ) -> Result<ReconcileOutcome, ModerationError> {
        let _guard = self.registry.lock_key(key).await;
        let Some(entry) = self.registry.get(&key) else {
            debug!(%key, ?trigger, "Nothing tracked; ignoring");
            return Ok(ReconcileOutcome::Untracked);
        };

        if let Some(job) = &entry.job {
            match self.scheduler.cancel(job) {
                Ok(outcome) => debug!(%key, ?outcome, "Expiry job cancelled"),
                Err(e) => warn!(%key, error = %e, "Failed to cancel expiry job; continuing"),
            }
        }

        // The entry goes even if the row stays: its job is already cancelled or
        // fired, and the next restore finds the leftover row expired or stale.
        if let Err(e) = self.repository.delete_punishment(&key).await {
            warn!(%key, error = %e, "Failed to delete punishment row; left for next restore");
        }
        self.registry.remove(&key);

        let reversed = match trigger {
            ReconcileTrigger::Unpunish => self.reverse(&entry.punishment).await?,
            ReconcileTrigger::ExternalRemoval => false,
        };
        info!(%key, ?trigger, reversed, "Punishment reconciled");
        Ok(ReconcileOutcome::Reconciled { reversed })
    }

    async fn reverse(&self, punishment: &Punishment) -> Result<bool, ModerationError> {
        let community = punishment.community;
        let result = match punishment.kind() {
            PunishmentKind::Ban => self.platform.unban(community, punishment.subject).await,
            PunishmentKind::Mute => {
                self.platform
                    .set_member_roles(community, punishment.subject, punishment.saved_roles())
                    .await
            }
        };
        match result {
            Ok(()) => Ok(true),
            Err(PlatformError::SubjectAbsent) => {
                debug!(key = %punishment.key(), "Subject gone; nothing to reverse");
                Ok(false)
            }
            Err(e) => Err(ModerationError::from_platform(community, e)),
        }
    }
}
