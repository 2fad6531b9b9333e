//! Warden Moderation - Network-Wide Punishment Engine
//!
//! Applies bans, mutes and kicks across every community of a moderation
//! network and keeps the resulting punishments consistent for their whole
//! lifetime:
//!
//! - **Bus**: `EventBus` named-topic publish/subscribe, the engine's only input
//! - **Resolution**: `NetworkResolver` maps an origin community to its targets
//! - **Fan-out**: `FanOutExecutor` applies an action target by target with
//!   early abort and no rollback
//! - **Expiry**: `ExpiryScheduler` fires one unpunish event per temporary
//!   punishment
//! - **Registry**: `PunishmentRegistry` holds at most one active punishment per
//!   (kind, subject, community)
//! - **Reconciliation**: `Reconciler` clears entries on unpunish and on
//!   removals made outside the bot
//! - **Restore**: `PunishmentLoader` rebuilds the registry after a restart
//!
//! # Architecture
//!
//! This is a **Layer 5 (Feature)** crate. It depends only on the traits in
//! `warden-core`; production handlers come from `warden-effects` and test
//! doubles from `warden-testkit`.

pub mod bus;
pub mod engine;
pub mod error;
pub mod executor;
pub mod loader;
pub mod reconcile;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod tasks;

pub use bus::{BusError, EventBus, Observer};
pub use engine::{EngineDeps, EngineSettings, ModerationEngine, ENGINE_TOPICS};
pub use error::ModerationError;
pub use executor::{FanOutAbort, FanOutCommand, FanOutExecutor, FanOutReport, TargetReport};
pub use loader::{PunishmentLoader, RestoreSummary};
pub use reconcile::{ReconcileOutcome, ReconcileTrigger, Reconciler};
pub use registry::{KeyGuard, PunishmentRegistry, RegistryEntry, RegistryError};
pub use resolver::NetworkResolver;
pub use scheduler::{CancelOutcome, ExpiryScheduler, JobHandle, SchedulerError};
pub use service::{ModerationService, RuntimeService, ServiceError, ServiceHealth};
pub use tasks::TaskRegistry;
