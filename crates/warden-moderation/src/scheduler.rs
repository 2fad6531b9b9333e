//! One-shot expiry scheduler
//!
//! `schedule_at` runs a callback once the clock reaches an absolute instant.
//! Each job runs on its own task and re-reads the clock after every sleep, so
//! it fires at or after its instant and never before. The returned
//! `JobHandle` can be cancelled at any time; cancelling a job that already
//! fired (or was already cancelled) is a no-op.
//!
//! # Blocking Lock Usage
//!
//! The job table is a `parking_lot::Mutex` held only for map inserts and
//! removals. A job task takes it once, after its state transition, and never
//! across an `.await`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;
use warden_core::{PhysicalTime, PhysicalTimeEffects};

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

const CLOCK_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Scheduler failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The scheduler was shut down
    #[error("Expiry scheduler is shut down")]
    Closed,
    /// No tokio runtime is available to run the job
    #[error("No async runtime available for expiry jobs")]
    NoRuntime,
}

/// What a cancel call found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was pending and will never fire
    Cancelled,
    /// The job had already fired
    AlreadyFired,
    /// The job had already been cancelled
    AlreadyCancelled,
}

/// Handle to a scheduled job
#[derive(Clone)]
pub struct JobHandle {
    id: Uuid,
    fire_at: PhysicalTime,
    state: Arc<AtomicU8>,
}

impl JobHandle {
    /// Unique id of the job
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Instant the job fires at
    pub fn fire_at(&self) -> PhysicalTime {
        self.fire_at
    }

    /// Whether the job is still waiting to fire
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::SeqCst) == PENDING
    }

    /// Whether the job has fired
    pub fn has_fired(&self) -> bool {
        self.state.load(Ordering::SeqCst) == FIRED
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::SeqCst) {
            PENDING => "pending",
            FIRED => "fired",
            _ => "cancelled",
        };
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("fire_at", &self.fire_at)
            .field("state", &state)
            .finish()
    }
}

/// Runs one-shot callbacks at absolute instants
pub struct ExpiryScheduler {
    time: Arc<dyn PhysicalTimeEffects>,
    jobs: Arc<Mutex<HashMap<Uuid, AbortHandle>>>,
    closed: AtomicBool,
}

impl ExpiryScheduler {
    /// Create a scheduler driven by `time`
    pub fn new(time: Arc<dyn PhysicalTimeEffects>) -> Self {
        Self {
            time,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// Run `job` once the clock reaches `at`
    pub fn schedule_at<F>(&self, at: PhysicalTime, job: F) -> Result<JobHandle, SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::Closed);
        }
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let handle = JobHandle {
            id: Uuid::new_v4(),
            fire_at: at,
            state: Arc::new(AtomicU8::new(PENDING)),
        };
        let id = handle.id;
        let state = handle.state.clone();
        let jobs = self.jobs.clone();
        let time = self.time.clone();

        // Insert while holding the table so the task cannot remove itself first.
        let mut table = self.jobs.lock();
        let task = runtime.spawn(async move {
            wait_until(time.as_ref(), at).await;
            if state
                .compare_exchange(PENDING, FIRED, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                jobs.lock().remove(&id);
                debug!(job = %id, %at, "Expiry job fired");
                job();
            }
        });
        table.insert(id, task.abort_handle());
        debug!(job = %id, %at, "Expiry job scheduled");
        Ok(handle)
    }

    /// Cancel a pending job
    pub fn cancel(&self, handle: &JobHandle) -> Result<CancelOutcome, SchedulerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::Closed);
        }
        match handle
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {
                if let Some(task) = self.jobs.lock().remove(&handle.id) {
                    task.abort();
                }
                debug!(job = %handle.id, "Expiry job cancelled");
                Ok(CancelOutcome::Cancelled)
            }
            Err(FIRED) => Ok(CancelOutcome::AlreadyFired),
            Err(_) => Ok(CancelOutcome::AlreadyCancelled),
        }
    }

    /// Number of jobs that have neither fired nor been cancelled
    pub fn pending_count(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Whether `shutdown` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Abort every pending job and refuse further work
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let drained: Vec<AbortHandle> = self.jobs.lock().drain().map(|(_, task)| task).collect();
        if !drained.is_empty() {
            debug!(jobs = drained.len(), "Aborting pending expiry jobs");
        }
        for task in drained {
            task.abort();
        }
    }
}

impl fmt::Debug for ExpiryScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiryScheduler")
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn wait_until(time: &dyn PhysicalTimeEffects, at: PhysicalTime) {
    loop {
        let now = match time.physical_time().await {
            Ok(now) => now,
            Err(e) => {
                warn!(error = %e, "Clock unavailable; retrying expiry wait");
                tokio::time::sleep(CLOCK_RETRY_BACKOFF).await;
                continue;
            }
        };
        if at.has_elapsed(now) {
            return;
        }
        let remaining = u64::try_from(at.remaining_since(now).as_millis()).unwrap_or(u64::MAX);
        if let Err(e) = time.sleep_ms(remaining).await {
            warn!(error = %e, "Sleep interrupted; retrying expiry wait");
            tokio::time::sleep(CLOCK_RETRY_BACKOFF).await;
        }
    }
}
