//! Hand-driven wall clock
//!
//! Time only moves when a test calls `advance` or `set`. Sleepers wake as
//! soon as the clock reaches their deadline, so expiry jobs can be fired
//! deterministically without waiting real minutes.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use warden_core::{PhysicalTime, PhysicalTimeEffects, TimeError};

/// Default start instant: 2024-01-01T00:00:00Z
pub const DEFAULT_START_MS: u64 = 1_704_067_200_000;

/// Controllable `PhysicalTimeEffects` implementation
#[derive(Debug)]
pub struct SimulatedClock {
    now_ms: watch::Sender<u64>,
}

impl SimulatedClock {
    /// Clock starting at `start_ms`
    pub fn new(start_ms: u64) -> Self {
        let (now_ms, _) = watch::channel(start_ms);
        Self { now_ms }
    }

    /// Current instant
    pub fn now(&self) -> PhysicalTime {
        PhysicalTime::from_ms(*self.now_ms.borrow())
    }

    /// Move the clock forward, waking every sleeper whose deadline passed
    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.now_ms.send_modify(|now| *now = now.saturating_add(millis));
    }

    /// Jump to an absolute instant
    pub fn set(&self, to: PhysicalTime) {
        self.now_ms.send_replace(to.ts_ms);
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(DEFAULT_START_MS)
    }
}

#[async_trait]
impl PhysicalTimeEffects for SimulatedClock {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        Ok(self.now())
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        let deadline = self.now().ts_ms.saturating_add(ms);
        let mut now_rx = self.now_ms.subscribe();
        loop {
            if *now_rx.borrow_and_update() >= deadline {
                return Ok(());
            }
            if now_rx.changed().await.is_err() {
                return Err(TimeError::ServiceUnavailable);
            }
        }
    }
}
