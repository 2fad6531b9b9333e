//! In-memory index of active punishments
//!
//! At most one entry exists per `PunishmentKey`. Each entry owns the handle
//! of its expiry job, if it has one. The registry is rebuilt from storage on
//! restart and is the only mutable shared state of the engine.
//!
//! Multi-step operations on one key (fan-out to a community, reconciliation)
//! serialize through `lock_key`, which hands out a per-key async guard held
//! across the whole lookup, platform call and persistence sequence.

use crate::scheduler::JobHandle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use warden_core::{Punishment, PunishmentKey, UserId};

/// Registry failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// An entry already exists for this key
    #[error("Active punishment already tracked for {0}")]
    AlreadyActive(PunishmentKey),
}

/// A tracked punishment and its expiry job
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// The active punishment
    pub punishment: Punishment,
    /// Pending expiry job; `None` for permanent punishments
    pub job: Option<JobHandle>,
}

impl RegistryEntry {
    /// Pair a punishment with its job
    pub fn new(punishment: Punishment, job: Option<JobHandle>) -> Self {
        Self { punishment, job }
    }

    /// Key of the tracked punishment
    pub fn key(&self) -> PunishmentKey {
        self.punishment.key()
    }
}

type KeyLocks = Mutex<HashMap<PunishmentKey, Arc<AsyncMutex<()>>>>;

/// Index of active punishments by key
#[derive(Debug, Default)]
pub struct PunishmentRegistry {
    entries: Mutex<HashMap<PunishmentKey, RegistryEntry>>,
    key_locks: KeyLocks,
}

impl PunishmentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock_key(&self, key: PunishmentKey) -> KeyGuard<'_> {
        let lock = self.key_locks.lock().entry(key).or_default().clone();
        let guard = lock.clone().lock_owned().await;
        KeyGuard {
            locks: &self.key_locks,
            key,
            lock,
            guard: Some(guard),
        }
    }

    /// Track a new punishment
    pub fn insert(&self, entry: RegistryEntry) -> Result<(), RegistryError> {
        let key = entry.key();
        let mut entries = self.entries.lock();
        if entries.contains_key(&key) {
            return Err(RegistryError::AlreadyActive(key));
        }
        entries.insert(key, entry);
        Ok(())
    }

    /// Whether a punishment is tracked under `key`
    pub fn contains(&self, key: &PunishmentKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Copy of the tracked entry for `key`
    pub fn get(&self, key: &PunishmentKey) -> Option<RegistryEntry> {
        self.entries.lock().get(key).cloned()
    }

    /// Stop tracking `key`, returning its entry
    pub fn remove(&self, key: &PunishmentKey) -> Option<RegistryEntry> {
        self.entries.lock().remove(key)
    }

    /// Keys of every tracked punishment of `subject`, sorted
    pub fn keys_for_subject(&self, subject: UserId) -> Vec<PunishmentKey> {
        let mut keys: Vec<PunishmentKey> = self
            .entries
            .lock()
            .keys()
            .filter(|key| key.subject == subject)
            .copied()
            .collect();
        keys.sort();
        keys
    }

    /// Every tracked punishment, sorted by key
    pub fn snapshot(&self) -> Vec<Punishment> {
        let mut entries: Vec<(PunishmentKey, Punishment)> = self
            .entries
            .lock()
            .iter()
            .map(|(key, entry)| (*key, entry.punishment.clone()))
            .collect();
        entries.sort_by_key(|(key, _)| *key);
        entries.into_iter().map(|(_, punishment)| punishment).collect()
    }

    /// Number of tracked punishments
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove and return every entry
    pub fn drain(&self) -> Vec<RegistryEntry> {
        self.entries.lock().drain().map(|(_, entry)| entry).collect()
    }
}

/// Exclusive access to one key; released on drop
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: PunishmentKey,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyGuard<'_> {
    /// The key this guard protects
    pub fn key(&self) -> PunishmentKey {
        self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock();
        // One reference in the table and one here means nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}
