//! Bounded execution of long-running checks off the update-handling path.

use std::{future::Future, sync::Arc};

use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("job was cancelled")]
    Cancelled,

    #[error("job panicked")]
    Panicked,
}

/// Runs at most `workers` jobs at a time; extra jobs wait for a slot.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Spawn `job`. It starts once a slot is free and is dropped (aborting
    /// any I/O it is awaiting) as soon as `token` fires.
    pub fn submit<F, T>(&self, token: CancellationToken, job: F) -> JobHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let handle = tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = token.cancelled() => return None,
                permit = permits.acquire_owned() => permit.ok()?,
            };
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                out = job => Some(out),
            }
        });
        JobHandle { handle }
    }
}

/// Handle to a submitted job.
#[derive(Debug)]
pub struct JobHandle<T> {
    handle: JoinHandle<Option<T>>,
}

impl<T> JobHandle<T> {
    pub async fn join(self) -> Result<T, JobError> {
        match self.handle.await {
            Ok(Some(v)) => Ok(v),
            Ok(None) => Err(JobError::Cancelled),
            Err(e) if e.is_panic() => Err(JobError::Panicked),
            Err(_) => Err(JobError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn returns_job_output() {
        let pool = WorkerPool::new(2);
        let h = pool.submit(CancellationToken::new(), async { 40 + 2 });
        assert_eq!(h.join().await, Ok(42));
    }

    #[tokio::test]
    async fn cancel_aborts_pending_work() {
        let pool = WorkerPool::new(1);
        let token = CancellationToken::new();
        let h = pool.submit(token.clone(), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            1
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        assert_eq!(h.join().await, Err(JobError::Cancelled));

        // The slot is free again.
        let next = pool.submit(CancellationToken::new(), async { 2 });
        assert_eq!(next.join().await, Ok(2));
    }

    #[tokio::test]
    async fn queued_job_can_be_cancelled_before_it_starts() {
        let pool = WorkerPool::new(1);
        let blocker = pool.submit(CancellationToken::new(), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
        });
        let token = CancellationToken::new();
        let queued = pool.submit(token.clone(), async { "ran" });
        token.cancel();
        assert_eq!(queued.join().await, Err(JobError::Cancelled));
        assert!(blocker.join().await.is_ok());
    }

    #[tokio::test]
    async fn panics_are_reported() {
        let pool = WorkerPool::new(1);
        let h = pool.submit(CancellationToken::new(), async {
            if true {
                panic!("boom");
            }
            0
        });
        assert_eq!(h.join().await, Err(JobError::Panicked));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                pool.submit(CancellationToken::new(), async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
