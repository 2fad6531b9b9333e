//! Warden Core - Moderation Domain Types and Effect Interfaces
//!
//! This crate holds everything the moderation engine and its collaborators
//! agree on, without committing to a runtime:
//!
//! - Identifiers: `UserId`, `CommunityId`, `RoleId`, `ChannelId`, `NetworkName`
//! - Time: `PhysicalTime` wall-clock instants used for punishment expiry
//! - Punishment model: `Punishment`, `Sanction`, `PunishmentKey`
//! - Bus payloads: `Topic`, `BusEvent` and one typed payload per topic
//! - Effect traits: storage, time, platform and community repository
//! - Configuration: `WardenConfig`
//!
//! # Architecture
//!
//! This is a **Layer 1 (Interface)** crate. Handlers live in `warden-effects`
//! (Layer 3), the engine in `warden-moderation` (Layer 5), and test doubles in
//! `warden-testkit`.

pub mod community;
pub mod config;
pub mod effects;
pub mod events;
pub mod identifiers;
pub mod punishment;
pub mod time;

pub use community::CommunityConfig;
pub use config::{ConfigError, WardenConfig};
pub use effects::{
    CommunityRepository, PhysicalTimeEffects, PlatformEffects, PlatformError, RepositoryError,
    StorageEffects, StorageError, TimeError,
};
pub use events::{
    ActionKind, ActionOutcome, BusEvent, InvocationContext, InvokerReply, KickRequest, ModAction,
    PunishRequest, Responder, RestrictionLifted, SkipReason, Topic, UnpunishRequest,
};
pub use identifiers::{ChannelId, CommunityId, NetworkName, RoleId, UserId};
pub use punishment::{Punishment, PunishmentKey, PunishmentKind, Sanction};
pub use time::PhysicalTime;
