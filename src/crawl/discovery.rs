//! Pagination discovery for category listings.
//!
//! A listing advances by numbered pager, a "next" control, or "load more" /
//! infinite scroll. Every activation is judged by the grid signature and by
//! whether the accumulated link set grew, so a pager that silently keeps
//! showing the same page stops discovery instead of spinning to the limit.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::links;
use super::wait::{pause, read_html, wait_for_html, wait_for_signature_change};
use crate::config::CrawlSettings;
use crate::driver::{PageDriver, SelectorSet, PAGINATOR_INTO_VIEW};
use crate::site::CompiledSite;

pub struct PaginationDiscoverer {
    site: Arc<CompiledSite>,
    settings: CrawlSettings,
}

impl PaginationDiscoverer {
    pub fn new(site: Arc<CompiledSite>, settings: CrawlSettings) -> Self {
        Self { site, settings }
    }

    /// Every product URL reachable from a category and its subcategories.
    pub async fn discover<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        category_url: &str,
    ) -> BTreeSet<String> {
        let mut found = self
            .collect_confident(
                driver,
                category_url,
                self.settings.category_confidence_threshold,
            )
            .await;

        let subcategories = self.subcategories(driver, category_url).await;
        if !subcategories.is_empty() {
            info!(
                "{}: {} subcategories",
                category_url,
                subcategories.len()
            );
        }
        for sub in subcategories {
            let sub_links = self
                .collect_confident(driver, &sub, self.settings.subcategory_confidence_threshold)
                .await;
            debug!("{}: {} links", sub, sub_links.len());
            found.extend(sub_links);
        }

        info!("{}: {} product links", category_url, found.len());
        found
    }

    /// Paginated links, topped up from script payloads when suspiciously few.
    async fn collect_confident<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        url: &str,
        threshold: usize,
    ) -> BTreeSet<String> {
        let mut found = self.collect_with_pagination(driver, url).await;
        if found.len() < threshold {
            let extra = self.script_pass(driver, url).await;
            let before = found.len();
            found.extend(extra);
            if found.len() > before {
                debug!(
                    "{}: script payloads added {} links",
                    url,
                    found.len() - before
                );
            }
        }
        found
    }

    /// Walk one listing through whichever pagination pattern it offers.
    pub async fn collect_with_pagination<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        url: &str,
    ) -> BTreeSet<String> {
        let profile = &self.site.profile;
        let timings = &self.settings.timings;

        if let Err(e) = driver.navigate(&profile.root_url()).await {
            debug!("root visit before {} failed: {}", url, e);
        }
        if let Err(e) = driver.navigate(url).await {
            warn!("Could not open listing {}: {}", url, e);
        }
        self.wait_grid(driver, url).await;
        if let Err(e) = driver.run_script(PAGINATOR_INTO_VIEW).await {
            debug!("paginator scroll failed: {}", e);
        }
        pause(timings.between_pages()).await;

        let html = self.html(driver).await;
        let mut found = links::collect_product_links(&self.site, url, &html);

        let last = links::pager_numbers(&self.site, &html)
            .into_iter()
            .max()
            .unwrap_or(0);
        if last >= 2 {
            let last = last.min(self.settings.max_pages_per_category);
            debug!("{}: numbered pager up to {}", url, last);
            for page in 2..=last {
                let before = driver.signature(&self.site).await.unwrap_or_default();
                let mut moved = self
                    .activate(driver, &SelectorSet::page_number(profile, page), &before)
                    .await;
                if !moved {
                    moved = self
                        .activate(driver, &SelectorSet::next(profile), &before)
                        .await;
                }
                if !moved {
                    debug!("{}: page {} did not change the grid", url, page);
                }
                pause(timings.between_pages()).await;
                self.wait_grid(driver, url).await;

                if !self.absorb(driver, url, &mut found).await {
                    debug!("{}: no new links on page {}, stopping", url, page);
                    break;
                }
            }
            return found;
        }

        for _ in 0..self.settings.max_pages_per_category {
            let before = driver.signature(&self.site).await.unwrap_or_default();
            if !self
                .activate(driver, &SelectorSet::next(profile), &before)
                .await
            {
                break;
            }
            pause(timings.between_pages()).await;
            if !self.absorb(driver, url, &mut found).await {
                break;
            }
        }

        for _ in 0..self.settings.load_more_rounds {
            let clicked = driver
                .find_and_click(&SelectorSet::load_more(profile))
                .await
                .unwrap_or(false);
            if !clicked {
                if let Err(e) = driver.scroll_to_bottom().await {
                    debug!("scroll failed: {}", e);
                }
            }
            pause(timings.between_pages()).await;
            self.wait_grid(driver, url).await;
            if !self.absorb(driver, url, &mut found).await {
                break;
            }
        }

        found
    }

    /// Product paths embedded in the listing's inline scripts.
    async fn script_pass<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        url: &str,
    ) -> BTreeSet<String> {
        if let Err(e) = driver.navigate(url).await {
            warn!("Could not reopen listing {}: {}", url, e);
        }
        self.wait_grid(driver, url).await;
        let html = self.html(driver).await;
        links::script_product_links(&self.site, url, &html)
    }

    async fn subcategories<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        category_url: &str,
    ) -> Vec<String> {
        if links::subcategory_prefix(&self.site, category_url).is_none() {
            return Vec::new();
        }
        if let Err(e) = driver.navigate(category_url).await {
            warn!("Could not reopen {} for subcategories: {}", category_url, e);
            return Vec::new();
        }
        self.wait_grid(driver, category_url).await;
        let html = self.html(driver).await;
        links::subcategory_links(&self.site, category_url, &html)
    }

    /// Click a control and report whether the grid changed.
    async fn activate<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        set: &SelectorSet,
        before: &str,
    ) -> bool {
        match driver.find_and_click(set).await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                debug!(purpose = ?set.purpose, "click failed: {}", e);
                return false;
            }
        }
        let timings = &self.settings.timings;
        wait_for_signature_change(
            driver,
            &self.site,
            before,
            timings.signature_change(),
            timings.poll(),
        )
        .await
    }

    /// Merge the current page's links; true when the set grew.
    async fn absorb<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        url: &str,
        found: &mut BTreeSet<String>,
    ) -> bool {
        let html = self.html(driver).await;
        let before = found.len();
        found.extend(links::collect_product_links(&self.site, url, &html));
        found.len() > before
    }

    async fn wait_grid<D: PageDriver + ?Sized>(&self, driver: &mut D, url: &str) {
        let site = &self.site;
        let timings = &self.settings.timings;
        let ready = wait_for_html(driver, timings.grid_ready(), timings.poll(), |html| {
            links::has_product_link(site, url, html)
        })
        .await;
        if !ready {
            debug!("{}: grid not ready", url);
        }
    }

    async fn html<D: PageDriver + ?Sized>(&self, driver: &mut D) -> String {
        read_html(driver, 3, self.settings.timings.poll()).await
    }
}
