//! Fully wired engine over in-memory collaborators

use crate::clock::SimulatedClock;
use crate::platform::MockPlatform;
use crate::recorder::{EventCollector, RecordingResponder};
use crate::repository::FaultyRepository;
use std::sync::Arc;
use std::time::Duration;
use warden_core::{
    CommunityConfig, CommunityId, CommunityRepository, InvocationContext, NetworkName,
    PhysicalTime, PunishRequest, RoleId, Topic, UserId,
};
use warden_effects::{MemoryStorageHandler, StorageCommunityRepository};
use warden_moderation::{EngineDeps, EngineSettings, EventBus, ModerationEngine};

/// Engine, bus, storage, platform and clock wired together for tests.
///
/// `audit` records every `mod action`, `unban` and `unmute` event.
pub struct TestHarness {
    /// Process bus
    pub bus: Arc<EventBus>,
    /// Backing storage of `repository`
    pub storage: Arc<MemoryStorageHandler>,
    /// Community and punishment rows
    pub repository: Arc<StorageCommunityRepository>,
    /// The engine's view of `repository`, with injectable failures
    pub faults: Arc<FaultyRepository>,
    /// Mock platform
    pub platform: Arc<MockPlatform>,
    /// Simulated clock
    pub clock: Arc<SimulatedClock>,
    /// Engine under test, not yet attached to the bus
    pub engine: ModerationEngine,
    /// Recorder of audit and unpunish traffic
    pub audit: Arc<EventCollector>,
    settings: EngineSettings,
}

impl TestHarness {
    /// Harness with default settings
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    /// Harness with custom engine settings
    pub fn with_settings(settings: EngineSettings) -> Self {
        let storage = Arc::new(MemoryStorageHandler::new());
        let platform = Arc::new(MockPlatform::new());
        let clock = Arc::new(SimulatedClock::default());
        Self::assemble(storage, platform, clock, settings)
    }

    /// A fresh engine and bus over the same storage, platform and clock,
    /// as after a process restart.
    pub fn restart(&self) -> Self {
        self.engine.shutdown();
        Self::assemble(
            self.storage.clone(),
            self.platform.clone(),
            self.clock.clone(),
            self.settings.clone(),
        )
    }

    fn assemble(
        storage: Arc<MemoryStorageHandler>,
        platform: Arc<MockPlatform>,
        clock: Arc<SimulatedClock>,
        settings: EngineSettings,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let repository = Arc::new(StorageCommunityRepository::new(storage.clone()));
        let faults = Arc::new(FaultyRepository::new(repository.clone()));
        let engine = ModerationEngine::new(
            EngineDeps {
                bus: bus.clone(),
                repository: faults.clone(),
                platform: platform.clone(),
                time: clock.clone(),
            },
            settings.clone(),
        );
        let audit = EventCollector::attach(&bus, &[Topic::ModAction, Topic::Unban, Topic::Unmute]);
        Self {
            bus,
            storage,
            repository,
            faults,
            platform,
            clock,
            engine,
            audit,
            settings,
        }
    }

    /// Store a community row
    pub async fn add_community(
        &self,
        id: u64,
        network: Option<&str>,
        mute_role: Option<u64>,
    ) -> CommunityId {
        let id = CommunityId::new(id);
        let mut config = CommunityConfig::new(id);
        if let Some(network) = network.and_then(NetworkName::new) {
            config = config.with_network(network);
        }
        if let Some(role) = mute_role {
            config = config.with_mute_role(RoleId::new(role));
        }
        if let Err(e) = self.repository.save_community(&config).await {
            panic!("Failed to store community {id}: {e}");
        }
        id
    }

    /// Current simulated instant
    pub fn now(&self) -> PhysicalTime {
        self.clock.now()
    }

    /// Simulated instant `after` from now
    pub fn after(&self, after: Duration) -> PhysicalTime {
        self.clock.now().saturating_add(after)
    }

    /// Invocation context in `origin` with a recording responder
    pub fn context(&self, origin: CommunityId) -> (InvocationContext, Arc<RecordingResponder>) {
        let responder = RecordingResponder::new();
        let context = InvocationContext::new(origin, format!("community-{origin}"), MODERATOR)
            .with_responder(responder.clone());
        (context, responder)
    }

    /// Punish request from `origin` with a recording responder
    pub fn punish_request(
        &self,
        origin: CommunityId,
        subject: UserId,
        reason: &str,
        expires_at: Option<PhysicalTime>,
    ) -> (PunishRequest, Arc<RecordingResponder>) {
        let (context, responder) = self.context(origin);
        let request = PunishRequest {
            context,
            subject,
            reason: reason.to_string(),
            expires_at,
        };
        (request, responder)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Moderator id used by harness contexts
pub const MODERATOR: UserId = UserId::new(900);
