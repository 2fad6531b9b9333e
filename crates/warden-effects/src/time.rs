//! Layer 3: Time Effect Handlers - Production Only
//!
//! Stateless implementation of `PhysicalTimeEffects` delegating to system
//! time and the tokio timer.

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use warden_core::effects::{PhysicalTimeEffects, TimeError};
use warden_core::PhysicalTime;

/// Real time handler for production use
#[derive(Debug, Clone, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalTimeEffects for RealTimeHandler {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TimeError::ClockUnavailable {
                reason: format!("system clock before Unix epoch: {e}"),
            })?;
        let ts_ms = u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX);
        Ok(PhysicalTime::from_ms(ts_ms))
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }
}
