//! Compiled form of a [`SiteProfile`].

use regex::Regex;
use scraper::Selector;
use url::Url;

use crate::config::SiteProfile;
use crate::error::ConfigError;

/// Selectors and patterns parsed once and shared by every component.
#[derive(Debug)]
pub struct CompiledSite {
    pub profile: SiteProfile,
    pub base: Url,
    pub product_link: Selector,
    pub product_path: Regex,
    pub script_link: Regex,
    pub category_segment: Regex,
    pub pager_number: Selector,
    pub detail: Selector,
    pub titles: Vec<Selector>,
    pub description: Selector,
    pub image: Selector,
    pub background_image: Selector,
    pub material_item: Selector,
    pub material: Regex,
    pub variation_group: Selector,
    pub variation_label: Selector,
    pub variation_chip: Selector,
    pub select: Selector,
    pub option: Selector,
    pub sku: Selector,
    pub stock: Selector,
    pub anchor: Selector,
    pub script: Selector,
}

impl CompiledSite {
    pub fn compile(profile: &SiteProfile) -> Result<Self, ConfigError> {
        let base = Url::parse(&profile.base_url)
            .map_err(|_| ConfigError::BaseUrl(profile.base_url.clone()))?;

        Ok(Self {
            base,
            product_link: selector(&profile.product_link_selector)?,
            product_path: pattern(&profile.product_path_pattern)?,
            script_link: pattern(&profile.script_link_pattern)?,
            category_segment: pattern(&profile.category_segment_pattern)?,
            pager_number: selector(&profile.pager_number_selector)?,
            detail: selector(&profile.detail_selector)?,
            titles: profile
                .title_selectors
                .iter()
                .map(|s| selector(s))
                .collect::<Result<_, _>>()?,
            description: selector(&profile.description_selector)?,
            image: selector(&profile.image_selector)?,
            background_image: selector(&profile.background_image_selector)?,
            material_item: selector(&profile.material_item_selector)?,
            material: pattern(&profile.material_pattern)?,
            variation_group: selector(&profile.variation_group_selector)?,
            variation_label: selector(&profile.variation_label_selector)?,
            variation_chip: selector(&profile.variation_chip_selector)?,
            select: selector("select")?,
            option: selector("option")?,
            sku: selector(&profile.sku_selector)?,
            stock: selector(&profile.stock_selector)?,
            anchor: selector("a[href]")?,
            script: selector("script")?,
            profile: profile.clone(),
        })
    }

    /// Resolve an href against a page URL, dropping query and fragment.
    pub fn absolutize(&self, page_url: &str, href: &str) -> Option<String> {
        let page = Url::parse(page_url).unwrap_or_else(|_| self.base.clone());
        let mut url = page.join(href.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        url.set_query(None);
        url.set_fragment(None);
        Some(url.to_string())
    }

    /// Whether a URL lives on the configured site.
    pub fn is_same_site(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .is_some_and(|u| u.host_str() == self.base.host_str())
    }
}

pub(crate) fn selector(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

fn pattern(source: &str) -> Result<Regex, ConfigError> {
    Regex::new(source).map_err(|e| ConfigError::Pattern {
        pattern: source.to_string(),
        source: e,
    })
}
