//! Wall-clock time effect
//!
//! Expiry scheduling reads the clock and sleeps exclusively through this
//! trait so tests can drive time by hand.

use crate::time::PhysicalTime;
use async_trait::async_trait;

/// Error type for time operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    /// The clock could not be read
    #[error("Clock unavailable: {reason}")]
    ClockUnavailable {
        /// What went wrong
        reason: String,
    },
    /// Time service shut down while a caller was sleeping
    #[error("Time service unavailable")]
    ServiceUnavailable,
}

/// Wall-clock time source
#[async_trait]
pub trait PhysicalTimeEffects: Send + Sync {
    /// Current wall-clock time
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError>;

    /// Suspend for `ms` milliseconds of this clock's time
    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError>;
}

/// Blanket implementation for Arc<T> where T: PhysicalTimeEffects
#[async_trait]
impl<T: PhysicalTimeEffects + ?Sized> PhysicalTimeEffects for std::sync::Arc<T> {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        (**self).physical_time().await
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        (**self).sleep_ms(ms).await
    }
}
