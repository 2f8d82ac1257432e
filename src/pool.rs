//! Bounded worker pool with explicit task handles and cancellation.
//!
//! A [`WorkerPool`] is a semaphore with `workers` permits plus a
//! [`CancellationToken`]. Work is submitted through a [`TaskBatch`], which
//! owns a [`JoinSet`] of tasks that each resolve to `(key, Result<T,
//! TaskError>)`. The key travels with the task, so a panicking or cancelled
//! item is still reported under its own label.
//!
//! Cancellation is opt-in: nothing in this crate triggers the token. When a
//! caller cancels it, tasks still waiting for a permit finish immediately
//! with [`TaskError::Cancelled`]. An in-flight async task is dropped at its
//! next await point. An in-flight blocking task keeps running on its thread
//! and its result is discarded.

use futures::FutureExt as _;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why a submitted task produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The pool's cancellation token fired before the task finished.
    #[error("cancelled")]
    Cancelled,

    /// The task panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// A bounded pool of execution slots.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Pool with `workers` slots (at least one) and a fresh token.
    pub fn new(workers: usize) -> Self {
        Self::with_cancellation(workers, CancellationToken::new())
    }

    /// Pool with `workers` slots sharing the caller's token.
    pub fn with_cancellation(workers: usize, cancel: CancellationToken) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            cancel,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Token that cancels every task submitted to this pool.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start an empty batch of tasks on this pool.
    pub fn batch<K, T>(&self) -> TaskBatch<K, T>
    where
        K: Send + 'static,
        T: Send + 'static,
    {
        TaskBatch {
            pool: self.clone(),
            set: JoinSet::new(),
        }
    }
}

/// The set of tasks submitted to a pool in one run.
pub struct TaskBatch<K, T> {
    pool: WorkerPool,
    set: JoinSet<(K, Result<T, TaskError>)>,
}

impl<K, T> TaskBatch<K, T>
where
    K: Send + 'static,
    T: Send + 'static,
{
    /// Submit an async task. It starts once a slot is free.
    pub fn spawn<F>(&mut self, key: K, fut: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = Arc::clone(&self.pool.permits);
        let cancel = self.pool.cancel.clone();
        self.set.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TaskError::Cancelled),
                result = run_with_permit(permits, fut) => result,
            };
            (key, result)
        });
    }

    /// Submit a blocking closure. It runs on tokio's blocking pool once a
    /// slot is free.
    pub fn spawn_blocking<F>(&mut self, key: K, f: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let permits = Arc::clone(&self.pool.permits);
        let cancel = self.pool.cancel.clone();
        self.set.spawn(async move {
            let blocking = async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| TaskError::Cancelled)?;
                tokio::task::spawn_blocking(f).await.map_err(|e| {
                    if e.is_panic() {
                        TaskError::Panicked(panic_message(e.into_panic()))
                    } else {
                        TaskError::Cancelled
                    }
                })
            };
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TaskError::Cancelled),
                result = blocking => result,
            };
            (key, result)
        });
    }

    /// Number of tasks not yet collected.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Cancel every task in the pool this batch belongs to.
    pub fn cancel(&self) {
        self.pool.cancel.cancel();
    }

    /// Wait for the next task to finish, in completion order.
    ///
    /// Returns `None` once every task has been collected.
    pub async fn next_completed(&mut self) -> Option<(K, Result<T, TaskError>)> {
        loop {
            match self.set.join_next().await? {
                Ok(done) => return Some(done),
                // The wrapper future above never panics and is never aborted,
                // so this only happens while the runtime shuts down.
                Err(e) => warn!("Worker task lost: {}", e),
            }
        }
    }

    /// Collect every remaining result in completion order.
    pub async fn collect_all(mut self) -> Vec<(K, Result<T, TaskError>)> {
        let mut results = Vec::with_capacity(self.set.len());
        while let Some(done) = self.next_completed().await {
            results.push(done);
        }
        debug!("Collected {} task results", results.len());
        results
    }
}

async fn run_with_permit<F, T>(permits: Arc<Semaphore>, fut: F) -> Result<T, TaskError>
where
    F: Future<Output = T>,
{
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|_| TaskError::Cancelled)?;
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(|payload| TaskError::Panicked(panic_message(payload)))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_collects_every_result_with_its_key() {
        let pool = WorkerPool::new(2);
        let mut batch = pool.batch::<usize, usize>();
        for i in 0..5 {
            batch.spawn(i, async move { i * 10 });
        }
        let mut results = batch.collect_all().await;
        results.sort_by_key(|(k, _)| *k);
        assert_eq!(results.len(), 5);
        for (k, r) in results {
            assert_eq!(r, Ok(k * 10));
        }
    }

    #[tokio::test]
    async fn test_never_exceeds_worker_count() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut batch = pool.batch::<usize, ()>();
        for i in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            batch.spawn(i, async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }
        batch.collect_all().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panic_is_reported_under_its_key() {
        let pool = WorkerPool::new(2);
        let mut batch = pool.batch::<&'static str, u32>();
        batch.spawn("ok", async { 1 });
        batch.spawn("bad", async { panic!("boom") });
        let results = batch.collect_all().await;
        let bad = results.iter().find(|(k, _)| *k == "bad").unwrap();
        assert_eq!(bad.1, Err(TaskError::Panicked("boom".into())));
        let ok = results.iter().find(|(k, _)| *k == "ok").unwrap();
        assert_eq!(ok.1, Ok(1));
    }

    #[tokio::test]
    async fn test_blocking_panic_is_reported_under_its_key() {
        let pool = WorkerPool::new(1);
        let mut batch = pool.batch::<u8, u8>();
        batch.spawn_blocking(7, || panic!("blocking boom"));
        let results = batch.collect_all().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 7);
        assert!(matches!(&results[0].1, Err(TaskError::Panicked(m)) if m.contains("blocking boom")));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_yields_cancelled() {
        let pool = WorkerPool::new(1);
        pool.cancellation_token().cancel();
        let mut batch = pool.batch::<u8, u8>();
        batch.spawn(1, async { 1 });
        batch.spawn_blocking(2, || 2);
        let results = batch.collect_all().await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| *r == Err(TaskError::Cancelled)));
    }

    #[tokio::test]
    async fn test_blocking_tasks_run() {
        let pool = WorkerPool::new(3);
        let mut batch = pool.batch::<u32, u32>();
        for i in 0..6 {
            batch.spawn_blocking(i, move || i + 1);
        }
        let total: u32 = batch
            .collect_all()
            .await
            .into_iter()
            .map(|(_, r)| r.unwrap())
            .sum();
        assert_eq!(total, 21);
    }
}
