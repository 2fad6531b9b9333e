//! Warden Testkit - Shared Test Doubles and Fixtures
//!
//! - `MockPlatform`: in-memory platform with call recording and injectable
//!   permission and availability failures
//! - `SimulatedClock`: wall clock that only moves when told to
//! - `RecordingResponder`, `EventCollector`: capture replies and bus traffic
//! - `FaultyRepository`: repository wrapper with injectable storage failures
//! - `TestHarness`: an engine wired over all of the above and in-memory storage
//!
//! # Architecture
//!
//! This is a **Layer 8 (Testing)** crate; nothing outside tests depends on it.

pub mod clock;
pub mod harness;
pub mod platform;
pub mod recorder;
pub mod repository;

pub use clock::{SimulatedClock, DEFAULT_START_MS};
pub use harness::{TestHarness, MODERATOR};
pub use platform::{MockPlatform, PlatformCall};
pub use recorder::{EventCollector, RecordingResponder};
pub use repository::FaultyRepository;

use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const POLL_DEADLINE: Duration = Duration::from_secs(2);

/// Poll `condition` until it holds or two seconds of real time pass.
///
/// Returns whether the condition was met.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + POLL_DEADLINE;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
