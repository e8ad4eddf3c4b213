use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::models::Job;

/// Shared FIFO of product jobs, drained concurrently by workers.
///
/// The queue is filled once before the workers start; a pop that finds it
/// empty (or times out) tells the worker to stop.
#[derive(Clone)]
pub struct JobQueue {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    total: usize,
}

impl JobQueue {
    pub fn from_jobs(jobs: Vec<Job>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let total = jobs.len();
        for job in jobs {
            // The receiver is alive in this scope, so send cannot fail.
            let _ = tx.send(job);
        }
        Self {
            rx: Arc::new(Mutex::new(rx)),
            total,
        }
    }

    /// Jobs enqueued at construction.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Next job, or `None` once the queue is drained or `wait` elapses.
    pub async fn pop(&self, wait: Duration) -> Option<Job> {
        let mut rx = self.rx.lock().await;
        match rx.try_recv() {
            Ok(job) => Some(job),
            Err(mpsc::error::TryRecvError::Disconnected) => None,
            Err(mpsc::error::TryRecvError::Empty) => {
                tokio::time::timeout(wait, rx.recv()).await.ok().flatten()
            }
        }
    }
}
