//! Supervised background execution for rounds detached from their request.
//!
//! Each job runs in its own task; a watcher awaits it so that a panic is
//! logged with the job's label instead of vanishing with the task.

use std::future::Future;

use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, Default)]
pub struct Supervisor;

impl Supervisor {
    pub fn new() -> Self {
        Self
    }

    /// Run `job` in the background. The returned handle resolves once the job
    /// has finished and its outcome has been logged.
    pub fn spawn<F>(&self, label: String, job: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let inner = tokio::spawn(job);
        tokio::spawn(async move {
            match inner.await {
                Ok(()) => tracing::debug!(job = %label, "Background job finished"),
                Err(e) if e.is_panic() => {
                    tracing::error!(job = %label, error = %e, "Background job panicked")
                }
                Err(e) => tracing::warn!(job = %label, error = %e, "Background job cancelled"),
            }
        })
    }
}
