//! Fixed pool of workers draining the job queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::queue::JobQueue;
use super::worker::Worker;
use crate::config::CrawlSettings;
use crate::driver::{DriverFactory, PageDriver, Session};
use crate::models::{Job, ProductRecord};
use crate::site::CompiledSite;

/// What the pool produced: usable records and jobs for the slow pass.
#[derive(Debug, Default)]
pub struct PoolOutcome {
    pub results: Vec<ProductRecord>,
    pub retry: Vec<Job>,
}

pub struct WorkerPool<F: DriverFactory> {
    factory: Arc<F>,
    site: Arc<CompiledSite>,
    settings: Arc<CrawlSettings>,
    session: Arc<Session>,
}

impl<F: DriverFactory> WorkerPool<F> {
    pub fn new(
        factory: Arc<F>,
        site: Arc<CompiledSite>,
        settings: Arc<CrawlSettings>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            factory,
            site,
            settings,
            session,
        }
    }

    /// Process every job with `worker_count` workers (at least one).
    pub async fn run(&self, jobs: Vec<Job>, worker_count: usize) -> PoolOutcome {
        let worker_count = worker_count.max(1);
        let queue = JobQueue::from_jobs(jobs);
        info!(
            "Processing {} jobs with {} workers",
            queue.total(),
            worker_count
        );

        let (ok_tx, ok_rx) = mpsc::unbounded_channel::<ProductRecord>();
        let (retry_tx, retry_rx) = mpsc::unbounded_channel::<Job>();
        let collector = tokio::spawn(collect(ok_rx, retry_rx));

        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let factory = self.factory.clone();
            let site = self.site.clone();
            let settings = self.settings.clone();
            let session = self.session.clone();
            let queue = queue.clone();
            let ok_tx = ok_tx.clone();
            let retry_tx = retry_tx.clone();

            handles.push(tokio::spawn(async move {
                let driver = match factory.create().await {
                    Ok(d) => d,
                    Err(e) => {
                        error!(worker = id, "could not start driver: {}", e);
                        return;
                    }
                };
                let Some(driver) = prime(id, driver, &site, &session).await else {
                    return;
                };

                let wait = settings.timings.queue_wait();
                let mut worker = Worker::new(id, driver, site, settings);
                while let Some(job) = queue.pop(wait).await {
                    match worker.process(&job).await {
                        Ok(record) => {
                            let _ = ok_tx.send(record);
                        }
                        Err(e) => {
                            warn!(worker = id, "{}: {}", job, e);
                            let _ = retry_tx.send(job);
                        }
                    }
                }
                worker.finish().await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("worker task failed: {}", e);
            }
        }

        // Jobs no live worker could take go to the slow pass.
        while let Some(job) = queue.pop(std::time::Duration::ZERO).await {
            let _ = retry_tx.send(job);
        }
        drop(ok_tx);
        drop(retry_tx);

        let outcome = collector.await.unwrap_or_default();
        info!(
            "Pool done: {} records, {} jobs to retry",
            outcome.results.len(),
            outcome.retry.len()
        );
        outcome
    }
}

async fn prime<D: PageDriver>(
    id: usize,
    mut driver: D,
    site: &CompiledSite,
    session: &Session,
) -> Option<D> {
    match driver.prime_session(&site.profile.root_url(), session).await {
        Ok(()) => Some(driver),
        Err(e) => {
            error!(worker = id, "could not prime session: {}", e);
            driver.close().await;
            None
        }
    }
}

async fn collect(
    mut ok_rx: mpsc::UnboundedReceiver<ProductRecord>,
    mut retry_rx: mpsc::UnboundedReceiver<Job>,
) -> PoolOutcome {
    let mut outcome = PoolOutcome::default();
    let mut ok_open = true;
    let mut retry_open = true;
    while ok_open || retry_open {
        tokio::select! {
            record = ok_rx.recv(), if ok_open => match record {
                Some(record) => outcome.results.push(record),
                None => ok_open = false,
            },
            job = retry_rx.recv(), if retry_open => match job {
                Some(job) => outcome.retry.push(job),
                None => retry_open = false,
            },
        }
    }
    outcome
}
