use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Detached side effects (mail and the like). Failures are logged here and
/// never reach the request that spawned the task.
#[derive(Debug, Clone)]
pub struct TaskPool {
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl TaskPool {
    pub fn new(max_concurrency: usize) -> Self {
        let permits = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn spawn<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            let run = async {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if let Err(err) = fut.await {
                    tracing::warn!(task = name, "background task failed: {err:#}");
                }
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(task = name, "background task cancelled");
                }
                _ = run => {}
            }
        });
    }

    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Waits up to `grace` for running tasks, then cancels whatever is left.
    pub async fn shutdown(&self, grace: Duration) {
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            tracing::warn!(pending = self.tracker.len(), "cancelling background tasks");
            self.cancel.cancel();
            self.tracker.wait().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn failures_do_not_escape_and_shutdown_drains() {
        let pool = TaskPool::new(2);
        let done = Arc::new(AtomicUsize::new(0));
        for i in 0..4 {
            let done = Arc::clone(&done);
            pool.spawn("test", async move {
                done.fetch_add(1, Ordering::SeqCst);
                if i % 2 == 0 {
                    anyhow::bail!("boom {i}");
                }
                Ok(())
            });
        }
        pool.shutdown(Duration::from_secs(5)).await;
        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn shutdown_cancels_stuck_tasks() {
        let pool = TaskPool::new(1);
        pool.spawn("stuck", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        pool.shutdown(Duration::from_millis(50)).await;
        assert!(pool.is_empty());
    }
}
