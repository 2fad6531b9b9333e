//! Sequential fan-out of one moderation action across its targets
//!
//! Targets are attempted strictly in order, each awaited before the next.
//! Every attempt is classified:
//!
//! - applied: the row is persisted, the expiry job scheduled and the registry
//!   entry inserted before moving on
//! - benign skip (subject absent, already punished there, no mute role):
//!   audited and passed over
//! - insufficient authority or any other failure: the remaining targets are
//!   abandoned and the invoker is told once. Targets already applied stay
//!   applied.
//!
//! The invoker is acknowledged as soon as the first target completes; later
//! targets only show up as `mod action` audit events.

use crate::bus::EventBus;
use crate::error::ModerationError;
use crate::registry::{PunishmentRegistry, RegistryEntry};
use crate::scheduler::{ExpiryScheduler, JobHandle};
use std::sync::Arc;
use tracing::{debug, info, warn};
use warden_core::{
    ActionKind, ActionOutcome, BusEvent, CommunityId, CommunityRepository, InvocationContext,
    InvokerReply, ModAction, PhysicalTime, PlatformEffects, Punishment, PunishmentKey,
    PunishmentKind, SkipReason, UserId,
};

/// One action to apply across a target set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutCommand {
    /// Ban, mute or kick
    pub action: ActionKind,
    /// User the action targets
    pub subject: UserId,
    /// Reason recorded with the action
    pub reason: String,
    /// Absolute expiry for temporary bans and mutes
    pub expires_at: Option<PhysicalTime>,
}

/// Outcome for one attempted target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetReport {
    /// Community attempted
    pub community: CommunityId,
    /// Applied or skipped
    pub outcome: ActionOutcome,
}

/// Where and why a fan-out stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutAbort {
    /// Community whose attempt failed
    pub community: CommunityId,
    /// The failure
    pub error: ModerationError,
}

/// Result of a fan-out run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Completed targets, in attempt order
    pub outcomes: Vec<TargetReport>,
    /// Set when the run stopped before the last target
    pub abort: Option<FanOutAbort>,
}

impl FanOutReport {
    /// Communities where the action took effect
    pub fn applied(&self) -> Vec<CommunityId> {
        self.outcomes
            .iter()
            .filter(|report| report.outcome == ActionOutcome::Applied)
            .map(|report| report.community)
            .collect()
    }

    /// Whether every target was attempted
    pub fn is_complete(&self) -> bool {
        self.abort.is_none()
    }
}

/// Applies actions across target communities
#[derive(Clone)]
pub struct FanOutExecutor {
    platform: Arc<dyn PlatformEffects>,
    repository: Arc<dyn CommunityRepository>,
    registry: Arc<PunishmentRegistry>,
    scheduler: Arc<ExpiryScheduler>,
    bus: Arc<EventBus>,
}

impl FanOutExecutor {
    /// Create an executor over the engine's collaborators
    pub fn new(
        platform: Arc<dyn PlatformEffects>,
        repository: Arc<dyn CommunityRepository>,
        registry: Arc<PunishmentRegistry>,
        scheduler: Arc<ExpiryScheduler>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            platform,
            repository,
            registry,
            scheduler,
            bus,
        }
    }

    /// Apply `command` to `targets` in order.
    ///
    /// Fails without touching any target when the subject is already punished
    /// in the origin community. Failures during the run are reported through
    /// `FanOutReport::abort`.
    pub async fn apply(
        &self,
        command: &FanOutCommand,
        targets: &[CommunityId],
        context: &InvocationContext,
    ) -> Result<FanOutReport, ModerationError> {
        if let Some(kind) = command.action.punishment_kind() {
            let origin_key = PunishmentKey::new(kind, command.subject, context.origin);
            if targets.contains(&context.origin) && self.registry.contains(&origin_key) {
                let error = ModerationError::AlreadyPunished {
                    kind,
                    subject: command.subject,
                    community: context.origin,
                };
                info!(key = %origin_key, "Rejected: already punished in origin community");
                context.reply(error.reply()).await;
                return Err(error);
            }
        }

        let mut report = FanOutReport::default();
        for &community in targets {
            let outcome = match self.apply_target(command, community).await {
                Ok(outcome) => outcome,
                Err(ModerationError::AbsentSubject { .. }) => {
                    ActionOutcome::Skipped(SkipReason::SubjectAbsent)
                }
                Err(error) => {
                    warn!(
                        %community,
                        subject = %command.subject,
                        action = %command.action,
                        error = %error,
                        "Fan-out aborted"
                    );
                    context.reply(error.reply()).await;
                    report.abort = Some(FanOutAbort { community, error });
                    return Ok(report);
                }
            };

            self.audit(command, community, outcome, context);
            if report.outcomes.is_empty() {
                context
                    .reply(InvokerReply::Acknowledged {
                        action: command.action,
                        subject: command.subject,
                        reason: command.reason.clone(),
                        expires_at: command.expires_at,
                    })
                    .await;
            }
            report.outcomes.push(TargetReport { community, outcome });
        }
        Ok(report)
    }

    async fn apply_target(
        &self,
        command: &FanOutCommand,
        community: CommunityId,
    ) -> Result<ActionOutcome, ModerationError> {
        let Some(kind) = command.action.punishment_kind() else {
            self.platform
                .kick(community, command.subject, &command.reason)
                .await
                .map_err(|e| ModerationError::from_platform(community, e))?;
            info!(%community, subject = %command.subject, "Kicked");
            return Ok(ActionOutcome::Applied);
        };

        let key = PunishmentKey::new(kind, command.subject, community);
        let _guard = self.registry.lock_key(key).await;
        if self.registry.contains(&key) {
            debug!(%key, "Already punished here; skipping");
            return Ok(ActionOutcome::Skipped(SkipReason::AlreadyPunished));
        }

        let punishment = match kind {
            PunishmentKind::Ban => {
                self.platform
                    .ban(community, command.subject, &command.reason)
                    .await
                    .map_err(|e| ModerationError::from_platform(community, e))?;
                Punishment::ban(
                    command.subject,
                    community,
                    command.reason.clone(),
                    command.expires_at,
                )
            }
            PunishmentKind::Mute => {
                let mute_role = self
                    .repository
                    .community(community)
                    .await?
                    .and_then(|config| config.mute_role);
                let Some(mute_role) = mute_role else {
                    debug!(%community, "No mute role configured; skipping");
                    return Ok(ActionOutcome::Skipped(SkipReason::MuteRoleUnset));
                };
                let held = self
                    .platform
                    .member_roles(community, command.subject)
                    .await
                    .map_err(|e| ModerationError::from_platform(community, e))?;
                self.platform
                    .set_member_roles(community, command.subject, &[mute_role])
                    .await
                    .map_err(|e| ModerationError::from_platform(community, e))?;
                let saved_roles = held.into_iter().filter(|role| *role != mute_role).collect();
                Punishment::mute(
                    command.subject,
                    community,
                    command.reason.clone(),
                    command.expires_at,
                    saved_roles,
                )
            }
        };

        self.repository.save_punishment(&punishment).await?;
        let job = arm_expiry(&self.scheduler, &self.bus, &punishment);
        self.registry.insert(RegistryEntry::new(punishment, job))?;
        info!(%key, expires_at = ?command.expires_at, "Punishment applied");
        Ok(ActionOutcome::Applied)
    }

    fn audit(
        &self,
        command: &FanOutCommand,
        community: CommunityId,
        outcome: ActionOutcome,
        context: &InvocationContext,
    ) {
        self.bus.publish(BusEvent::ModAction(ModAction {
            community,
            action: command.action,
            outcome,
            origin_name: context.origin_name.clone(),
            subject: command.subject,
            moderator: context.moderator,
            reason: Some(command.reason.clone()),
            expires_at: command.expires_at,
        }));
    }
}

/// Schedule the unpunish event of a temporary punishment.
///
/// A scheduling failure leaves the punishment tracked without a job; it is
/// picked up again on the next restart.
pub(crate) fn arm_expiry(
    scheduler: &ExpiryScheduler,
    bus: &Arc<EventBus>,
    punishment: &Punishment,
) -> Option<JobHandle> {
    let at = punishment.expires_at?;
    let (kind, subject, community) = (punishment.kind(), punishment.subject, punishment.community);
    let bus = bus.clone();
    match scheduler.schedule_at(at, move || {
        bus.publish(BusEvent::unpunish(kind, subject, community));
    }) {
        Ok(job) => Some(job),
        Err(e) => {
            warn!(key = %punishment.key(), error = %e, "Failed to schedule expiry");
            None
        }
    }
}
