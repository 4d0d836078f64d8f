//! Cancellable background tasks
//!
//! A [`BackgroundTask`] owns at most one running tokio task. Starting is
//! idempotent while the task is alive; stopping cancels its token and waits
//! a bounded time for it to finish before aborting it.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Running {
    token: CancellationToken,
    join: JoinHandle<()>,
}

pub struct BackgroundTask {
    name: &'static str,
    running: Mutex<Option<Running>>,
}

impl BackgroundTask {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Spawn the task unless one is already running.
    ///
    /// `make` receives the cancellation token the task must watch. Returns
    /// `false` when a live task already exists. Must be called inside a
    /// tokio runtime.
    pub fn start<F, Fut>(&self, make: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.lock();
        if running.as_ref().is_some_and(|r| !r.join.is_finished()) {
            debug!(task = self.name, "background task already running");
            return false;
        }
        let token = CancellationToken::new();
        let join = tokio::spawn(make(token.clone()));
        *running = Some(Running { token, join });
        debug!(task = self.name, "background task started");
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|r| !r.join.is_finished())
    }

    /// Cancel and join within `timeout`.
    ///
    /// Returns `false` if the task had to be aborted.
    pub async fn stop(&self, timeout: Duration) -> bool {
        let Some(Running { token, join }) = self.lock().take() else {
            return true;
        };
        token.cancel();
        let abort = join.abort_handle();
        match tokio::time::timeout(timeout, join).await {
            Ok(_) => {
                debug!(task = self.name, "background task stopped");
                true
            }
            Err(_) => {
                warn!(task = self.name, ?timeout, "background task did not stop in time, aborting");
                abort.abort();
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for BackgroundTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTask")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let task = BackgroundTask::new("test");
        let starts = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let starts = starts.clone();
            task.start(move |token| async move {
                starts.fetch_add(1, Ordering::SeqCst);
                token.cancelled().await;
            });
        }
        tokio::task::yield_now().await;

        assert!(task.is_running());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(task.stop(Duration::from_secs(1)).await);
        assert!(!task.is_running());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let task = BackgroundTask::new("test");
        assert!(task.start(|token| async move { token.cancelled().await }));
        assert!(task.stop(Duration::from_secs(1)).await);
        assert!(task.start(|token| async move { token.cancelled().await }));
        assert!(task.stop(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_stop_aborts_unresponsive_task() {
        let task = BackgroundTask::new("stubborn");
        task.start(|_token| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert!(!task.stop(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let task = BackgroundTask::new("idle");
        assert!(task.stop(Duration::from_millis(10)).await);
    }
}
