//! Moderation engine
//!
//! Owns the registry, scheduler and task registry, and wires the resolver,
//! executor, reconciler and loader to the bus. Bus dispatch is synchronous,
//! so the engine's observer only clones the event and hands it to a task;
//! all platform and storage work happens there.

use crate::bus::{EventBus, Observer};
use crate::error::ModerationError;
use crate::executor::{FanOutCommand, FanOutExecutor, FanOutReport};
use crate::loader::{PunishmentLoader, RestoreSummary};
use crate::reconcile::{ReconcileOutcome, ReconcileTrigger, Reconciler};
use crate::registry::PunishmentRegistry;
use crate::resolver::NetworkResolver;
use crate::scheduler::ExpiryScheduler;
use crate::tasks::TaskRegistry;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use warden_core::{
    ActionKind, BusEvent, CommunityRepository, InvocationContext, InvokerReply, KickRequest,
    PhysicalTime, PhysicalTimeEffects, PlatformEffects, PunishRequest, PunishmentKey,
    PunishmentKind, RestrictionLifted, Topic, UnpunishRequest, UserId, WardenConfig,
};

/// Topics the engine observes
pub const ENGINE_TOPICS: [Topic; 6] = [
    Topic::Ban,
    Topic::Mute,
    Topic::Kick,
    Topic::Unban,
    Topic::Unmute,
    Topic::RestrictionLifted,
];

/// Injected collaborators of the engine
#[derive(Clone)]
pub struct EngineDeps {
    /// Process-wide bus
    pub bus: Arc<EventBus>,
    /// Community configuration and punishment rows
    pub repository: Arc<dyn CommunityRepository>,
    /// Chat platform gateway
    pub platform: Arc<dyn PlatformEffects>,
    /// Wall clock
    pub time: Arc<dyn PhysicalTimeEffects>,
}

/// Settings the engine reads from `WardenConfig`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Shortest accepted temporary mute
    pub min_mute_duration: Duration,
    /// Reason substituted for an empty one
    pub default_reason: String,
}

impl From<&WardenConfig> for EngineSettings {
    fn from(config: &WardenConfig) -> Self {
        Self {
            min_mute_duration: config.min_mute_duration(),
            default_reason: config.default_reason.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&WardenConfig::default())
    }
}

struct EngineInner {
    settings: EngineSettings,
    bus: Arc<EventBus>,
    time: Arc<dyn PhysicalTimeEffects>,
    registry: Arc<PunishmentRegistry>,
    scheduler: Arc<ExpiryScheduler>,
    tasks: TaskRegistry,
    resolver: NetworkResolver,
    executor: FanOutExecutor,
    reconciler: Reconciler,
    loader: PunishmentLoader,
    observer: Arc<dyn Observer>,
}

/// Handle to the moderation engine; cheap to clone
#[derive(Clone)]
pub struct ModerationEngine {
    inner: Arc<EngineInner>,
}

struct EngineObserver {
    engine: Weak<EngineInner>,
}

impl Observer for EngineObserver {
    fn notify(&self, event: &BusEvent) {
        let Some(inner) = self.engine.upgrade() else {
            return;
        };
        let engine = ModerationEngine {
            inner: inner.clone(),
        };
        let event = event.clone();
        let topic = event.topic();
        if !inner
            .tasks
            .spawn_cancellable(async move { engine.handle(event).await })
        {
            warn!(%topic, "Dropped event; engine cannot spawn tasks");
        }
    }
}

impl ModerationEngine {
    /// Build an engine over `deps`
    pub fn new(deps: EngineDeps, settings: EngineSettings) -> Self {
        let registry = Arc::new(PunishmentRegistry::new());
        let scheduler = Arc::new(ExpiryScheduler::new(deps.time.clone()));
        let inner = Arc::new_cyclic(|weak: &Weak<EngineInner>| EngineInner {
            settings,
            bus: deps.bus.clone(),
            time: deps.time.clone(),
            registry: registry.clone(),
            scheduler: scheduler.clone(),
            tasks: TaskRegistry::new(),
            resolver: NetworkResolver::new(deps.repository.clone()),
            executor: FanOutExecutor::new(
                deps.platform.clone(),
                deps.repository.clone(),
                registry.clone(),
                scheduler.clone(),
                deps.bus.clone(),
            ),
            reconciler: Reconciler::new(
                deps.platform.clone(),
                deps.repository.clone(),
                registry.clone(),
                scheduler.clone(),
            ),
            loader: PunishmentLoader::new(
                deps.platform,
                deps.repository,
                registry,
                scheduler,
                deps.bus,
                deps.time,
            ),
            observer: Arc::new(EngineObserver {
                engine: weak.clone(),
            }),
        });
        Self { inner }
    }

    /// Registry of active punishments
    pub fn registry(&self) -> &Arc<PunishmentRegistry> {
        &self.inner.registry
    }

    /// Expiry scheduler
    pub fn scheduler(&self) -> &Arc<ExpiryScheduler> {
        &self.inner.scheduler
    }

    /// Bus the engine observes
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    /// Number of event-handling tasks still running
    pub fn active_tasks(&self) -> usize {
        self.inner.tasks.active_count()
    }

    /// Subscribe the engine to its topics
    pub fn attach(&self) {
        for topic in ENGINE_TOPICS {
            self.inner.bus.subscribe(topic, self.inner.observer.clone());
        }
    }

    /// Unsubscribe the engine from its topics
    pub fn detach(&self) {
        for topic in ENGINE_TOPICS {
            self.inner.bus.unsubscribe(topic, &self.inner.observer);
        }
    }

    /// Route one bus event to its handler
    pub async fn handle(&self, event: BusEvent) {
        let topic = event.topic();
        let result = match event {
            BusEvent::Ban(request) => self.punish(PunishmentKind::Ban, request).await.map(drop),
            BusEvent::Mute(request) => self.punish(PunishmentKind::Mute, request).await.map(drop),
            BusEvent::Kick(request) => self.kick(request).await.map(drop),
            BusEvent::Unban(request) => self.unpunish(PunishmentKind::Ban, request).await.map(drop),
            BusEvent::Unmute(request) => {
                self.unpunish(PunishmentKind::Mute, request).await.map(drop)
            }
            BusEvent::RestrictionLifted(lifted) => self.observe_lifted(lifted).await.map(drop),
            BusEvent::ModAction(_) => Ok(()),
        };
        if let Err(e) = result {
            warn!(%topic, error = %e, "Event handling failed");
        }
    }

    /// Apply a ban or mute across the origin's network
    pub async fn punish(
        &self,
        kind: PunishmentKind,
        request: PunishRequest,
    ) -> Result<FanOutReport, ModerationError> {
        let PunishRequest {
            context,
            subject,
            reason,
            expires_at,
        } = request;

        if let Some(expires_at) = expires_at {
            if let Err(e) = self.validate_expiry(kind, expires_at).await {
                context.reply(e.reply()).await;
                return Err(e);
            }
        }

        let targets = match self.inner.resolver.resolve(context.origin).await {
            Ok(targets) => targets,
            Err(e) => {
                let e = ModerationError::from(e);
                context.reply(e.reply()).await;
                return Err(e);
            }
        };
        debug!(%subject, %kind, targets = targets.len(), "Applying punishment");

        let command = FanOutCommand {
            action: ActionKind::from(kind),
            subject,
            reason: self.reason_or_default(reason),
            expires_at,
        };
        self.inner.executor.apply(&command, &targets, &context).await
    }

    /// Kick the subject from one community
    pub async fn kick(&self, request: KickRequest) -> Result<FanOutReport, ModerationError> {
        let KickRequest {
            origin_name,
            subject,
            moderator,
            community,
            reason,
        } = request;
        let context = InvocationContext::new(community, origin_name, moderator);
        let command = FanOutCommand {
            action: ActionKind::Kick,
            subject,
            reason: self.reason_or_default(reason),
            expires_at: None,
        };
        self.inner.executor.apply(&command, &[community], &context).await
    }

    /// Reverse a tracked punishment in one community
    pub async fn unpunish(
        &self,
        kind: PunishmentKind,
        request: UnpunishRequest,
    ) -> Result<ReconcileOutcome, ModerationError> {
        let key = PunishmentKey::new(kind, request.subject, request.community);
        self.inner
            .reconciler
            .reconcile(key, ReconcileTrigger::Unpunish)
            .await
    }

    /// Forget a punishment the platform reports as already removed
    pub async fn observe_lifted(
        &self,
        lifted: RestrictionLifted,
    ) -> Result<ReconcileOutcome, ModerationError> {
        let key = PunishmentKey::new(lifted.kind, lifted.subject, lifted.community);
        self.inner
            .reconciler
            .reconcile(key, ReconcileTrigger::ExternalRemoval)
            .await
    }

    /// Publish an unpunish event for every tracked punishment of `subject`
    /// across the origin's network, and tell the invoker.
    ///
    /// Returns the number of events published.
    pub async fn request_network_unpunish(
        &self,
        kind: PunishmentKind,
        context: &InvocationContext,
        subject: UserId,
    ) -> Result<usize, ModerationError> {
        let targets = match self.inner.resolver.resolve(context.origin).await {
            Ok(targets) => targets,
            Err(e) => {
                let e = ModerationError::from(e);
                context.reply(e.reply()).await;
                return Err(e);
            }
        };

        let tracked: Vec<PunishmentKey> = targets
            .into_iter()
            .map(|community| PunishmentKey::new(kind, subject, community))
            .filter(|key| self.inner.registry.contains(key))
            .collect();

        if tracked.is_empty() {
            context
                .reply(InvokerReply::NotPunished { kind, subject })
                .await;
            return Ok(0);
        }
        for key in &tracked {
            self.inner
                .bus
                .publish(BusEvent::unpunish(kind, key.subject, key.community));
        }
        info!(%subject, %kind, communities = tracked.len(), "Requested network-wide reversal");
        context.reply(InvokerReply::Reversed { kind, subject }).await;
        Ok(tracked.len())
    }

    /// Publish one `kick` event per community in the origin's network.
    ///
    /// Returns the number of events published.
    pub async fn request_network_kick(
        &self,
        context: &InvocationContext,
        subject: UserId,
        reason: String,
    ) -> Result<usize, ModerationError> {
        let targets = match self.inner.resolver.resolve(context.origin).await {
            Ok(targets) => targets,
            Err(e) => {
                let e = ModerationError::from(e);
                context.reply(e.reply()).await;
                return Err(e);
            }
        };
        let reason = self.reason_or_default(reason);
        for &community in &targets {
            self.inner.bus.publish(BusEvent::Kick(KickRequest {
                origin_name: context.origin_name.clone(),
                subject,
                moderator: context.moderator,
                community,
                reason: reason.clone(),
            }));
        }
        context
            .reply(InvokerReply::Acknowledged {
                action: ActionKind::Kick,
                subject,
                reason,
                expires_at: None,
            })
            .await;
        Ok(targets.len())
    }

    /// Rebuild the registry from storage
    pub async fn restore(&self) -> Result<RestoreSummary, ModerationError> {
        self.inner.loader.restore().await
    }

    /// Stop background work and forget every tracked punishment.
    ///
    /// Persisted rows are kept; `restore` picks them up on the next start.
    pub fn shutdown(&self) {
        self.detach();
        self.inner.tasks.shutdown();
        self.inner.scheduler.shutdown();
        let dropped = self.inner.registry.drain().len();
        debug!(dropped, "Engine shut down");
    }

    async fn validate_expiry(
        &self,
        kind: PunishmentKind,
        expires_at: PhysicalTime,
    ) -> Result<(), ModerationError> {
        let now = self.inner.time.physical_time().await?;
        if expires_at.has_elapsed(now) {
            return Err(ModerationError::validation(
                "The expiry must be in the future.",
            ));
        }
        let min = self.inner.settings.min_mute_duration;
        if kind == PunishmentKind::Mute && expires_at.remaining_since(now) < min {
            return Err(ModerationError::validation(format!(
                "Mutes must last at least {} seconds.",
                min.as_secs()
            )));
        }
        Ok(())
    }

    fn reason_or_default(&self, reason: String) -> String {
        let trimmed = reason.trim();
        if trimmed.is_empty() {
            self.inner.settings.default_reason.clone()
        } else if trimmed.len() == reason.len() {
            reason
        } else {
            trimmed.to_string()
        }
    }
}
