//! Link harvesting from rendered listing pages.
//!
//! All functions here parse a markup snapshot and return owned data, so
//! callers never hold a parsed document across an await point.

use std::collections::BTreeSet;

use scraper::Html;
use url::Url;

use crate::site::CompiledSite;

/// Product URLs in document order, duplicates kept.
fn product_hrefs(site: &CompiledSite, page_url: &str, doc: &Html) -> Vec<String> {
    let raw = doc
        .select(&site.product_link)
        .filter_map(|a| a.value().attr("href"));
    keep_products(site, page_url, raw)
}

fn keep_products<'a>(
    site: &CompiledSite,
    page_url: &str,
    hrefs: impl Iterator<Item = &'a str>,
) -> Vec<String> {
    hrefs
        .filter_map(|href| site.absolutize(page_url, href))
        .filter(|url| site.product_path.is_match(url_path(url)))
        .collect()
}

fn url_path(url: &str) -> &str {
    url.find("://")
        .and_then(|i| url[i + 3..].find('/').map(|j| &url[i + 3 + j..]))
        .unwrap_or(url)
}

/// Deduplicated product URLs rendered on the page.
pub fn collect_product_links(site: &CompiledSite, page_url: &str, html: &str) -> BTreeSet<String> {
    let doc = Html::parse_document(html);
    product_hrefs(site, page_url, &doc).into_iter().collect()
}

/// Whether at least one product link is rendered.
pub fn has_product_link(site: &CompiledSite, page_url: &str, html: &str) -> bool {
    let doc = Html::parse_document(html);
    !product_hrefs(site, page_url, &doc).is_empty()
}

/// Cheap fingerprint of the visible result grid.
///
/// First three and last three product hrefs plus the total count; empty
/// when the page shows no products.
pub fn page_signature(site: &CompiledSite, page_url: &str, html: &str) -> String {
    let doc = Html::parse_document(html);
    signature_of(&product_hrefs(site, page_url, &doc))
}

/// Signature from raw anchor hrefs gathered in the page.
pub fn signature_from_hrefs(site: &CompiledSite, page_url: &str, hrefs: &[String]) -> String {
    signature_of(&keep_products(site, page_url, hrefs.iter().map(String::as_str)))
}

pub(crate) fn signature_of(hrefs: &[String]) -> String {
    if hrefs.is_empty() {
        return String::new();
    }
    let head = hrefs[..hrefs.len().min(3)].join("|");
    let tail = hrefs[hrefs.len().saturating_sub(3)..].join("|");
    format!("{}::{}::{}", head, tail, hrefs.len())
}

/// Product paths embedded in inline script payloads.
pub fn script_product_links(site: &CompiledSite, page_url: &str, html: &str) -> BTreeSet<String> {
    let doc = Html::parse_document(html);
    let mut found = BTreeSet::new();
    for script in doc.select(&site.script) {
        let text: String = script.text().collect();
        for caps in site.script_link.captures_iter(&text) {
            let Some(path) = caps.get(1) else { continue };
            if let Some(url) = site.absolutize(page_url, path.as_str()) {
                found.insert(url);
            }
        }
    }
    found
}

/// Page numbers advertised by the pager.
pub fn pager_numbers(site: &CompiledSite, html: &str) -> Vec<u32> {
    let doc = Html::parse_document(html);
    let mut numbers: Vec<u32> = doc
        .select(&site.pager_number)
        .filter_map(|el| {
            let text: String = el.text().collect();
            let text = text.trim();
            if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
                text.parse().ok()
            } else {
                None
            }
        })
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}

/// Path prefix shared by a category's subcategories (`/categorias-aneis-`).
pub fn subcategory_prefix(site: &CompiledSite, category_url: &str) -> Option<String> {
    let url = Url::parse(category_url).ok()?;
    let caps = site.category_segment.captures(url.path())?;
    let segment = caps.get(1)?.as_str().trim_end_matches('-');
    Some(format!("/{}-", segment))
}

/// Same-site links under the category's subcategory prefix, in page order.
pub fn subcategory_links(site: &CompiledSite, category_url: &str, html: &str) -> Vec<String> {
    let Some(prefix) = subcategory_prefix(site, category_url) else {
        return Vec::new();
    };
    let own = site
        .absolutize(category_url, category_url)
        .unwrap_or_else(|| category_url.to_string());

    let doc = Html::parse_document(html);
    let mut out: Vec<String> = Vec::new();
    for anchor in doc.select(&site.anchor) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = site.absolutize(category_url, href) else {
            continue;
        };
        if !site.is_same_site(&url) || !url_path(&url).contains(&prefix) {
            continue;
        }
        if url.trim_end_matches('/') == own.trim_end_matches('/') || out.contains(&url) {
            continue;
        }
        out.push(url);
    }
    out
}
