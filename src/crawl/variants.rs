//! Variant matrix enumeration on a loaded product page.

use tracing::debug;

use super::wait::{read_html, wait_for_html};
use crate::config::CrawlTimings;
use crate::driver::PageDriver;
use crate::error::FetchError;
use crate::extract::{parse_variation_groups, read_sku, read_stock, VariationGroup};
use crate::models::{VariantChild, Variation};
use crate::site::CompiledSite;

/// Walk every option combination and record one child per combination.
///
/// Pages without variation groups yield the single implicit child shown,
/// or none when no SKU is readable.
pub async fn enumerate_variants<D: PageDriver + ?Sized>(
    driver: &mut D,
    site: &CompiledSite,
    timings: &CrawlTimings,
) -> Result<(Vec<Variation>, Vec<VariantChild>), FetchError> {
    let html = read_html(driver, 3, timings.poll()).await;
    let groups = parse_variation_groups(site, &html);

    if groups.is_empty() {
        let children = read_sku(site, &html)
            .map(|sku| vec![VariantChild::new(Some(sku), read_stock(site, &html))])
            .unwrap_or_default();
        return Ok((Vec::new(), children));
    }

    let variations = groups
        .iter()
        .map(|g| Variation::new(g.label.clone(), g.options.clone()))
        .collect();

    let mut children = Vec::new();
    for combo in combinations(&groups) {
        for (group, value) in groups.iter().zip(&combo) {
            if !driver.select_variation(group, value).await? {
                debug!(group = %group.label, "option {:?} not selectable", value);
            }
        }

        let mut shown: Option<(String, Option<u32>)> = None;
        wait_for_html(driver, timings.sku_wait(), timings.poll(), |html| {
            match read_sku(site, html) {
                Some(sku) => {
                    shown = Some((sku, read_stock(site, html)));
                    true
                }
                None => false,
            }
        })
        .await;

        let Some((sku, stock)) = shown else {
            return Err(FetchError::Extraction(format!(
                "no SKU rendered for {}",
                combo.join(" / ")
            )));
        };

        let child = groups
            .iter()
            .zip(&combo)
            .fold(VariantChild::new(Some(sku), stock), |child, (g, v)| {
                child.with_attribute(g.label.clone(), *v)
            });
        children.push(child);
    }

    Ok((variations, children))
}

/// Cartesian product of the groups' options, first group varying slowest.
fn combinations(groups: &[VariationGroup]) -> Vec<Vec<&str>> {
    groups.iter().fold(vec![Vec::new()], |acc, group| {
        acc.iter()
            .flat_map(|prefix| {
                group.options.iter().map(move |option| {
                    let mut next = prefix.clone();
                    next.push(option.as_str());
                    next
                })
            })
            .collect()
    })
}
