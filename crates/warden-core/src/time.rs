//! Wall-clock instants for punishment expiry
//!
//! Expiry is an absolute instant so that it survives process restarts: a row
//! persisted with `expires_at` is compared against the clock at load time and
//! either reversed immediately or rescheduled for the remaining duration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Physical wall-clock time in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhysicalTime {
    /// Milliseconds since the Unix epoch
    pub ts_ms: u64,
}

impl PhysicalTime {
    /// Create from milliseconds since the Unix epoch
    pub const fn from_ms(ts_ms: u64) -> Self {
        Self { ts_ms }
    }

    /// The instant `duration` after this one, saturating at `u64::MAX`
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self::from_ms(self.ts_ms.saturating_add(millis))
    }

    /// Time remaining from `now` until this instant; zero once elapsed
    pub fn remaining_since(self, now: PhysicalTime) -> Duration {
        Duration::from_millis(self.ts_ms.saturating_sub(now.ts_ms))
    }

    /// Whether this instant is at or before `now`
    pub fn has_elapsed(self, now: PhysicalTime) -> bool {
        self.ts_ms <= now.ts_ms
    }
}

impl fmt::Display for PhysicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.ts_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_and_elapsed() {
        let now = PhysicalTime::from_ms(10_000);
        let later = now.saturating_add(Duration::from_secs(600));

        assert_eq!(later.remaining_since(now), Duration::from_secs(600));
        assert!(!later.has_elapsed(now));
        assert!(now.has_elapsed(later));
        assert_eq!(now.remaining_since(later), Duration::ZERO);
    }

    #[test]
    fn test_saturating_add_does_not_overflow() {
        let edge = PhysicalTime::from_ms(u64::MAX - 1);
        assert_eq!(edge.saturating_add(Duration::from_secs(1)).ts_ms, u64::MAX);
    }
}
