//! Bounded worker pool executing dispatched handlers.
//!
//! Channel receive loops never run request-dependent work inline; they queue
//! it here. The queue is bounded, so a burst of messages backpressures the
//! submitting loop instead of growing without limit, and a slow handler only
//! occupies one worker while the rest keep draining.

use log::{debug, warn};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Fixed set of worker tasks fed from one bounded queue.
pub struct WorkerPool {
    queue: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` tasks sharing a queue of at most `capacity` pending
    /// jobs. Must be called from within a tokio runtime.
    pub fn new(workers: usize, capacity: usize) -> Self {
        let (queue, rx) = mpsc::channel::<Job>(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..workers)
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        // The lock is held only while waiting for the next
                        // job; it is released before the job runs.
                        let job = rx.lock().await.recv().await;
                        match job {
                            Some(job) => job.await,
                            None => break,
                        }
                    }
                    debug!("worker {} stopped", worker_id);
                })
            })
            .collect();

        Self { queue, workers }
    }

    /// Queues a handler for execution, waiting if the queue is full.
    pub async fn submit<F>(&self, job: F) -> Result<(), PoolClosed>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.queue.send(Box::pin(job)).await.map_err(|_| PoolClosed)
    }

    /// Closes the queue and waits for the workers to finish their remaining
    /// jobs.
    pub async fn shutdown(self) {
        drop(self.queue);
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!("worker task failed during shutdown: {}", e);
            }
        }
    }
}

/// The pool was shut down; the job was not scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolClosed;

impl fmt::Display for PoolClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker pool is closed")
    }
}

impl std::error::Error for PoolClosed {}
