//! A single crawl worker: one driver, one RNG, one job at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use super::backoff::{jitter, RetryBackoff};
use super::variants::enumerate_variants;
use super::wait::{pause, read_html, wait_for_html};
use crate::config::{CrawlSettings, CrawlTimings};
use crate::driver::{PageDriver, SCROLL_JIGGLE};
use crate::error::FetchError;
use crate::extract::{extract_fields, has_detail};
use crate::models::{common_sku_prefix, Job, ProductRecord};
use crate::site::CompiledSite;

/// Build a record from a product page the driver has already loaded.
///
/// Variant failures degrade to empty variations and children.
pub(crate) async fn scrape_loaded<D: PageDriver + ?Sized>(
    driver: &mut D,
    site: &CompiledSite,
    timings: &CrawlTimings,
    job: &Job,
    html: &str,
) -> ProductRecord {
    let mut record = extract_fields(site, &job.url, html, &job.category);
    match enumerate_variants(driver, site, timings).await {
        Ok((variations, children)) => {
            record.variations = variations;
            record.children = children;
        }
        Err(e) => warn!("{}: {}", job.url, e),
    }
    record.sku_base = common_sku_prefix(&record.children);
    record
}

pub(crate) fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub(crate) async fn pause_jittered(base: Duration, max_jitter: Duration, rng: &mut StdRng) {
    pause(base + jitter(rng, max_jitter)).await;
}

pub struct Worker<D> {
    id: usize,
    driver: D,
    site: Arc<CompiledSite>,
    settings: Arc<CrawlSettings>,
    rng: StdRng,
    backoff: RetryBackoff,
    processed: usize,
    started: Instant,
}

impl<D: PageDriver> Worker<D> {
    pub fn new(id: usize, driver: D, site: Arc<CompiledSite>, settings: Arc<CrawlSettings>) -> Self {
        let backoff = RetryBackoff::new(settings.retry_backoff_base(), settings.timings.jitter());
        Self {
            id,
            driver,
            site,
            settings,
            rng: seeded_rng(1000 + id as u64),
            backoff,
            processed: 0,
            started: Instant::now(),
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Fetch, extract and enumerate one product.
    ///
    /// Errors mean the job belongs on the retry list.
    pub async fn process(&mut self, job: &Job) -> Result<ProductRecord, FetchError> {
        let result = self.fetch_and_scrape(job).await;

        self.processed += 1;
        let every = self.settings.progress_every;
        if every > 0 && self.processed % every == 0 {
            let avg = self.started.elapsed().as_secs_f64() / self.processed as f64;
            info!(worker = self.id, "{} jobs done, {:.2}s per job", self.processed, avg);
        }
        result
    }

    async fn fetch_and_scrape(&mut self, job: &Job) -> Result<ProductRecord, FetchError> {
        let html = self.fetch(&job.url).await?;
        let timings = &self.settings.timings;
        let record = scrape_loaded(&mut self.driver, &self.site, timings, job, &html).await;
        if record.is_usable() {
            Ok(record)
        } else {
            Err(FetchError::TransientFetch {
                url: job.url.clone(),
            })
        }
    }

    /// Load a product page until it yields non-blank markup.
    pub async fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        let max_tries = self.settings.retry_max_tries.max(1);
        let root = self.site.profile.root_url();

        for attempt in 1..=max_tries {
            let timings = &self.settings.timings;

            if attempt > 1 && self.settings.referer_hop_on_retry {
                if let Err(e) = self.driver.navigate(&root).await {
                    debug!(worker = self.id, "root hop failed: {}", e);
                }
                let (base, spread) = timings.retry_hop();
                pause_jittered(base, spread, &mut self.rng).await;
            }

            match self.driver.navigate(url).await {
                Ok(()) => {}
                // Timed-out loads are still read.
                Err(e @ FetchError::NavigationTimeout { .. }) => {
                    warn!(worker = self.id, attempt, "{}", e);
                }
                Err(e) if e.is_transient() => {
                    warn!(worker = self.id, attempt, "{}: {}", url, e);
                    self.back_off(attempt, max_tries).await;
                    continue;
                }
                Err(e) => return Err(e),
            }

            pause_jittered(timings.after_nav(), timings.jitter(), &mut self.rng).await;
            let site = &self.site;
            let ready = wait_for_html(&mut self.driver, timings.product_ready(), timings.poll(), |html| {
                has_detail(site, html)
            })
            .await;
            if !ready {
                debug!(worker = self.id, attempt, "{}: detail block not rendered", url);
            }
            if let Err(e) = self.driver.run_script(SCROLL_JIGGLE).await {
                debug!(worker = self.id, "scroll jiggle failed: {}", e);
            }

            let html = read_html(&mut self.driver, 3, timings.poll()).await;
            if !html.trim().is_empty() {
                return Ok(html);
            }

            debug!(worker = self.id, attempt, "{}: blank page", url);
            self.back_off(attempt, max_tries).await;
        }

        Err(FetchError::PermanentFetch {
            url: url.to_string(),
            attempts: max_tries,
        })
    }

    async fn back_off(&mut self, attempt: u32, max_tries: u32) {
        if attempt < max_tries {
            let delay = self.backoff.delay(attempt, &mut self.rng);
            pause(delay).await;
        }
    }

    /// Close the driver and report totals.
    pub async fn finish(mut self) {
        self.driver.close().await;
        info!(
            worker = self.id,
            "finished {} jobs in {:.1}s",
            self.processed,
            self.started.elapsed().as_secs_f64()
        );
    }
}
