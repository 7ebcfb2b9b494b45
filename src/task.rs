use std::future::Future;

use tokio::task::JoinHandle;

/// A local task that is aborted when the guard is dropped.
///
/// Sessions own their periodic tasks through this guard, so every exit path
/// of a session cancels them.
pub(crate) struct TaskGuard(JoinHandle<()>);

impl TaskGuard {
    /// Spawn on the current `LocalSet`.
    pub(crate) fn spawn_local<F>(future: F) -> Self
    where
        F: Future<Output = ()> + 'static,
    {
        Self(tokio::task::spawn_local(future))
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
