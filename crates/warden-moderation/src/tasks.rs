//! Task registry for engine background work
//!
//! Bus observers run synchronously and must not block, so they hand each
//! event to a task spawned here. The registry tracks those tasks and aborts
//! whatever is still running on shutdown.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex` for JoinHandle storage because:
//! 1. Operations are a prune-and-push or a drain (shutdown only)
//! 2. Lock is never held across `.await` points

use parking_lot::Mutex;
use std::future::Future;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// Tracks spawned engine tasks and supports cooperative shutdown
#[derive(Debug)]
pub struct TaskRegistry {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn `fut` so that it stops early if the registry shuts down.
    ///
    /// Returns `false` without running `fut` when called outside a tokio
    /// runtime or after shutdown.
    pub fn spawn_cancellable<F>(&self, fut: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shut_down() {
            warn!("Task registry is shut down; dropping task");
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime available; dropping task");
            return false;
        };
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = runtime.spawn(async move {
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = fut => {}
            }
        });
        let mut handles = self.handles.lock();
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);
        true
    }

    /// Number of tasks that have not finished yet
    pub fn active_count(&self) -> usize {
        self.handles
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Signal shutdown and abort every tracked task
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawned_task_runs() {
        let tasks = TaskRegistry::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        assert!(tasks.spawn_cancellable(async move {
            let _ = tx.send(7);
        }));
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_and_refuses_new_work() {
        let tasks = TaskRegistry::new();
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        tasks.spawn_cancellable(async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tasks.shutdown();
        assert!(tasks.is_shut_down());
        assert_eq!(tasks.active_count(), 0);
        assert!(!tasks.spawn_cancellable(async {}));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_spawn_outside_runtime_is_refused() {
        let tasks = TaskRegistry::new();
        assert!(!tasks.spawn_cancellable(async {}));
    }
}
