//! Layer 3: Warden Effect Handlers
//!
//! Production implementations of the effect traits declared in `warden-core`:
//!
//! - `RealTimeHandler`: system wall clock, tokio sleeping
//! - `MemoryStorageHandler`: process-local key/value storage
//! - `FilesystemStorageHandler`: one JSON file per key with atomic writes
//! - `StorageCommunityRepository`: community and punishment rows over any
//!   `StorageEffects` backend
//!
//! **Layer Constraint**: no mock handlers here. Controllable clocks and
//! scripted platforms belong in `warden-testkit`.

pub mod repository;
pub mod storage;
pub mod time;

pub use repository::StorageCommunityRepository;
pub use storage::{FilesystemStorageHandler, MemoryStorageHandler};
pub use time::RealTimeHandler;
