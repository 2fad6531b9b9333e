//! Effect traits
//!
//! The engine never touches the platform, the clock or storage directly. It
//! talks to these traits, which `warden-effects` implements for production
//! and `warden-testkit` implements for tests.
//!
//! # Effect Classification
//!
//! - `StorageEffects`: infrastructure, key/value bytes
//! - `PhysicalTimeEffects`: infrastructure, wall clock and sleeping
//! - `PlatformEffects`: external collaborator, the chat platform gateway
//! - `CommunityRepository`: application, typed rows on top of storage

pub mod platform;
pub mod repository;
pub mod storage;
pub mod time;

pub use platform::{PlatformEffects, PlatformError};
pub use repository::{CommunityRepository, RepositoryError};
pub use storage::{StorageEffects, StorageError};
pub use time::{PhysicalTimeEffects, TimeError};
