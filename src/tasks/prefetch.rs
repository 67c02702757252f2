//! Prefetch Worker Pool
//!
//! A bounded job queue drained by a fixed number of workers. Jobs are
//! best-effort: a full queue drops the job, and failed or timed-out jobs are
//! logged and forgotten. Jobs run detached from the request that submitted
//! them, so cancelling a request never cancels its prefetch.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

struct Job {
    key: String,
    future: JobFuture,
}

/// Prefetch queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    /// Jobs refused because the queue was full, closed, or already held the key
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct PrefetchCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    dropped: AtomicU64,
}

impl PrefetchCounters {
    fn snapshot(&self) -> PrefetchStats {
        PrefetchStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

// == Prefetch Queue ==
pub struct PrefetchQueue {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Keys queued or running
    pending: Arc<Mutex<HashSet<String>>>,
    counters: Arc<PrefetchCounters>,
}

impl PrefetchQueue {
    /// Starts `workers` workers behind a queue holding at most `depth` jobs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(workers: usize, depth: usize, job_timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>(depth.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let pending = Arc::new(Mutex::new(HashSet::new()));
        let counters = Arc::new(PrefetchCounters::default());

        let handles = (0..workers.max(1))
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let pending = Arc::clone(&pending);
                let counters = Arc::clone(&counters);
                tokio::spawn(async move {
                    debug!(worker = id, "Prefetch worker started");
                    loop {
                        // The guard is released before the job runs.
                        let job = receiver.lock().await.recv().await;
                        let Some(Job { key, future }) = job else { break };
                        run_job(&key, future, job_timeout, &counters).await;
                        lock(&pending).remove(&key);
                    }
                    debug!(worker = id, "Prefetch worker stopped");
                })
            })
            .collect();

        info!(workers, depth, ?job_timeout, "Prefetch queue started");

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            pending,
            counters,
        }
    }

    /// Queues `job` under `key` without waiting.
    ///
    /// Returns false if the job was dropped: the queue is full or shut
    /// down, or a job for `key` is already queued or running.
    pub fn submit<F>(&self, key: impl Into<String>, job: F) -> bool
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let key = key.into();
        let sender = lock(&self.sender).clone();
        let Some(sender) = sender else {
            self.drop_job(&key, "queue is shut down");
            return false;
        };

        if !lock(&self.pending).insert(key.clone()) {
            self.drop_job(&key, "already pending");
            return false;
        }

        match sender.try_send(Job {
            key: key.clone(),
            future: Box::pin(job),
        }) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Prefetch queued");
                true
            }
            Err(err) => {
                lock(&self.pending).remove(&key);
                let reason = match err {
                    TrySendError::Full(_) => "queue is full",
                    TrySendError::Closed(_) => "queue is shut down",
                };
                self.drop_job(&key, reason);
                false
            }
        }
    }

    fn drop_job(&self, key: &str, reason: &str) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        debug!(key, reason, "Prefetch dropped");
    }

    /// Whether a job for `key` is queued or running.
    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.pending).contains(key)
    }

    pub fn stats(&self) -> PrefetchStats {
        self.counters.snapshot()
    }

    /// Stops accepting jobs, lets the workers drain what is queued, and
    /// waits for them to exit.
    pub async fn shutdown(&self) {
        drop(lock(&self.sender).take());
        let handles: Vec<_> = lock(&self.workers).drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Prefetch worker ended abnormally: {}", e);
            }
        }
        info!("Prefetch queue stopped");
    }
}

async fn run_job(key: &str, future: JobFuture, job_timeout: Duration, counters: &PrefetchCounters) {
    match tokio::time::timeout(job_timeout, future).await {
        Ok(Ok(())) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Prefetch completed");
        }
        Ok(Err(e)) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(key, error = %e, "Prefetch failed");
        }
        Err(_) => {
            counters.timed_out.fetch_add(1, Ordering::Relaxed);
            warn!(key, ?job_timeout, "Prefetch timed out");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
