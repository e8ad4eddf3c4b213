//! Single-driver, slow-paced second chance for jobs the pool gave up on.

use tracing::{debug, info, warn};

use super::wait::{read_html, wait_for_html};
use super::worker::{pause_jittered, scrape_loaded, seeded_rng};
use crate::config::CrawlSettings;
use crate::driver::{DriverFactory, PageDriver, Session};
use crate::extract::has_detail;
use crate::models::{Job, ProductRecord};
use crate::site::CompiledSite;

/// Attempt every job exactly once, sequentially, with generous pauses.
///
/// Jobs that still fail are logged and dropped.
pub async fn slow_retry_pass<F: DriverFactory>(
    factory: &F,
    site: &CompiledSite,
    settings: &CrawlSettings,
    session: &Session,
    jobs: Vec<Job>,
) -> Vec<ProductRecord> {
    if jobs.is_empty() {
        return Vec::new();
    }
    info!("Slow retry of {} jobs", jobs.len());

    let mut driver = match factory.create().await {
        Ok(d) => d,
        Err(e) => {
            warn!("Slow retry skipped, driver unavailable: {}", e);
            return Vec::new();
        }
    };
    if let Err(e) = driver.prime_session(&site.profile.root_url(), session).await {
        warn!("Slow retry skipped, session not restored: {}", e);
        driver.close().await;
        return Vec::new();
    }

    let timings = &settings.timings;
    let root = site.profile.root_url();
    let mut rng = seeded_rng(42);
    let mut recovered = Vec::new();
    let total = jobs.len();

    for (i, job) in jobs.iter().enumerate() {
        if settings.referer_hop_on_retry {
            if let Err(e) = driver.navigate(&root).await {
                debug!("root hop failed: {}", e);
            }
            let (base, spread) = timings.slow_hop();
            pause_jittered(base, spread, &mut rng).await;
        }

        if let Err(e) = driver.navigate(&job.url).await {
            warn!("slow retry {}: {}", job, e);
        }
        let (base, spread) = timings.slow_nav();
        pause_jittered(base, spread, &mut rng).await;

        wait_for_html(&mut driver, timings.slow_ready(), timings.poll(), |html| {
            has_detail(site, html)
        })
        .await;
        let html = read_html(&mut driver, 3, timings.poll()).await;

        if html.trim().is_empty() {
            warn!("slow retry {}: still blank, dropping", job);
        } else {
            let record = scrape_loaded(&mut driver, site, timings, job, &html).await;
            if record.is_usable() {
                recovered.push(record);
            } else {
                warn!("slow retry {}: no usable content, dropping", job);
            }
        }

        let (base, spread) = timings.slow_post();
        pause_jittered(base, spread, &mut rng).await;

        let done = i + 1;
        if settings.progress_every > 0 && done % settings.progress_every == 0 {
            info!("Slow retry progress: {}/{}", done, total);
        }
    }

    driver.close().await;
    info!("Slow retry recovered {}/{} jobs", recovered.len(), total);
    recovered
}
