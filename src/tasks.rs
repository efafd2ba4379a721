//! Explicit execution context for request-scoped tasks
//!
//! Connection handlers and per-item fetches are spawned on a `TaskScope`
//! instead of bare `tokio::spawn`, so shutdown can stop new work and wait
//! for what is already running.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Task group with a shared cancellation signal
///
/// Cloning is cheap; all clones track into the same group.
#[derive(Debug, Clone, Default)]
pub struct TaskScope {
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a tracked task
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(future)
    }

    /// Resolves once `shutdown` has been requested
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of tracked tasks still running
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Signal cancellation, refuse to count new tasks as pending work, and
    /// wait for every tracked task to finish
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
