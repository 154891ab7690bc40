//! Batch-scoped deferred task scheduling
//!
//! Every timer belonging to a submission batch is guarded by one shared
//! cancellation token, so the whole batch cancels atomically and a timer
//! that fires after cancellation never runs its body.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
pub struct BatchScheduler {
    token: CancellationToken,
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Run `task` after `delay`, unless the batch is cancelled first.
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                () = tokio::time::sleep(delay) => task.await,
            }
        });
    }

    /// Run `task` immediately as a batch-guarded background task; the task
    /// is dropped mid-await when the batch cancels.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                () = task => {}
            }
        });
    }

    /// Cancel every scheduled and running task in the batch. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_task_fires_after_delay() {
        let scheduler = BatchScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        scheduler.schedule(Duration::from_millis(500), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_pending_tasks() {
        let scheduler = BatchScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = fired.clone();
            scheduler.schedule(Duration::from_millis(300), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        scheduler.cancel();
        // Cancelling twice is a no-op
        scheduler.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_task_stops_on_cancel() {
        let scheduler = BatchScheduler::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = ticks.clone();
        scheduler.spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        let before = ticks.load(Ordering::SeqCst);
        assert_eq!(before, 3);

        scheduler.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), before);
    }
}
