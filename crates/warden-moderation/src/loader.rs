//! Rebuild the registry from persisted rows on start
//!
//! For every stored punishment:
//!
//! - already expired: the row is deleted and the matching unpunish event is
//!   published straight away, with no job
//! - still running but the restriction is gone from the platform (a muted
//!   member left or lost the mute role, a banned user was unbanned by hand):
//!   the row is deleted as stale and nothing is published
//! - otherwise: the entry is reinstated with a job for the remaining time
//!
//! If the platform cannot answer the presence check the punishment is kept.
//! A row that fails for any other reason is skipped and stays in storage.

use crate::bus::EventBus;
use crate::error::ModerationError;
use crate::executor::arm_expiry;
use crate::registry::{PunishmentRegistry, RegistryEntry};
use crate::scheduler::ExpiryScheduler;
use std::sync::Arc;
use tracing::{debug, info, warn};
use warden_core::{
    BusEvent, CommunityId, CommunityRepository, PhysicalTime, PhysicalTimeEffects, PlatformEffects,
    PlatformError, Punishment, PunishmentKind, UserId,
};

/// Counts of what `restore` did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Entries reinstated (with or without a job)
    pub reinstated: usize,
    /// Rows past their expiry, reversed immediately
    pub expired: usize,
    /// Rows whose restriction no longer exists, deleted
    pub stale: usize,
    /// Rows left untouched after an error
    pub failed: usize,
}

enum RowOutcome {
    AlreadyTracked,
    Expired,
    Stale,
    Reinstated,
}

/// Rebuilds registry entries from storage
#[derive(Clone)]
pub struct PunishmentLoader {
    platform: Arc<dyn PlatformEffects>,
    repository: Arc<dyn CommunityRepository>,
    registry: Arc<PunishmentRegistry>,
    scheduler: Arc<ExpiryScheduler>,
    bus: Arc<EventBus>,
    time: Arc<dyn PhysicalTimeEffects>,
}

impl PunishmentLoader {
    /// Create a loader over the engine's collaborators
    pub fn new(
        platform: Arc<dyn PlatformEffects>,
        repository: Arc<dyn CommunityRepository>,
        registry: Arc<PunishmentRegistry>,
        scheduler: Arc<ExpiryScheduler>,
        bus: Arc<EventBus>,
        time: Arc<dyn PhysicalTimeEffects>,
    ) -> Self {
        Self {
            platform,
            repository,
            registry,
            scheduler,
            bus,
            time,
        }
    }

    /// Load every persisted punishment.
    ///
    /// A row that cannot be handled is logged, counted as failed and left in
    /// storage for the next start; the remaining rows are still restored.
    pub async fn restore(&self) -> Result<RestoreSummary, ModerationError> {
        let rows = self.repository.load_punishments().await?;
        let now = self.time.physical_time().await?;
        let mut summary = RestoreSummary::default();

        for punishment in rows {
            let key = punishment.key();
            match self.restore_row(punishment, now).await {
                Ok(RowOutcome::AlreadyTracked) => {}
                Ok(RowOutcome::Expired) => summary.expired += 1,
                Ok(RowOutcome::Stale) => summary.stale += 1,
                Ok(RowOutcome::Reinstated) => summary.reinstated += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(%key, error = %e, "Failed to restore punishment; row kept");
                }
            }
        }

        info!(
            reinstated = summary.reinstated,
            expired = summary.expired,
            stale = summary.stale,
            failed = summary.failed,
            "Punishments restored"
        );
        Ok(summary)
    }

    async fn restore_row(
        &self,
        punishment: Punishment,
        now: PhysicalTime,
    ) -> Result<RowOutcome, ModerationError> {
        let key = punishment.key();
        let guard = self.registry.lock_key(key).await;
        if self.registry.contains(&key) {
            debug!(%key, "Already tracked; skipping row");
            return Ok(RowOutcome::AlreadyTracked);
        }

        if punishment.is_expired(now) {
            // Reconciliation deletes the row again, so a failure here only
            // delays the cleanup.
            if let Err(e) = self.repository.delete_punishment(&key).await {
                warn!(%key, error = %e, "Failed to delete expired row; reversing anyway");
            }
            self.registry.insert(RegistryEntry::new(punishment, None))?;
            drop(guard);
            info!(%key, "Punishment expired while offline; reversing");
            self.bus
                .publish(BusEvent::unpunish(key.kind, key.subject, key.community));
            return Ok(RowOutcome::Expired);
        }

        if !self.still_present(&punishment).await {
            self.repository.delete_punishment(&key).await?;
            info!(%key, "Restriction no longer present; dropped stale row");
            return Ok(RowOutcome::Stale);
        }

        let job = arm_expiry(&self.scheduler, &self.bus, &punishment);
        self.registry.insert(RegistryEntry::new(punishment, job))?;
        debug!(%key, "Punishment reinstated");
        Ok(RowOutcome::Reinstated)
    }

    async fn still_present(&self, punishment: &Punishment) -> bool {
        let (community, subject) = (punishment.community, punishment.subject);
        let check = match punishment.kind() {
            PunishmentKind::Ban => self.platform.is_banned(community, subject).await,
            PunishmentKind::Mute => self.still_muted(community, subject).await,
        };
        match check {
            Ok(present) => present,
            Err(e) => {
                warn!(key = %punishment.key(), error = %e, "Presence check failed; keeping punishment");
                true
            }
        }
    }

    /// A mute holds while the member is present and, when the community
    /// has a mute role, still carries it.
    async fn still_muted(
        &self,
        community: CommunityId,
        subject: UserId,
    ) -> Result<bool, PlatformError> {
        if !self.platform.is_member(community, subject).await? {
            return Ok(false);
        }
        let mute_role = match self.repository.community(community).await {
            Ok(config) => config.and_then(|config| config.mute_role),
            Err(e) => {
                warn!(%community, error = %e, "Failed to read mute role; assuming still muted");
                None
            }
        };
        match mute_role {
            Some(role) => match self.platform.member_roles(community, subject).await {
                Ok(roles) => Ok(roles.contains(&role)),
                Err(PlatformError::SubjectAbsent) => Ok(false),
                Err(e) => Err(e),
            },
            None => Ok(true),
        }
    }
}
