//! Field extraction from rendered product pages.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};

use crate::models::ProductRecord;
use crate::site::CompiledSite;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static BACKGROUND_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(["']?(https?://[^)"']+)"#).unwrap());
static TRAILING_SKU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9A-Za-z._/-]+)\s*$").unwrap());
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());
static SIZE_NUMERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,2})").unwrap());

const SELECT_PLACEHOLDERS: &[&str] = &[
    "selecione",
    "selecionar",
    "escolha uma opção",
    "choose an option",
];

/// How a variation group is operated on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Chips,
    Select,
}

/// One variation selector block on a product page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationGroup {
    /// Position among the page's variation blocks.
    pub index: usize,
    pub label: String,
    pub kind: GroupKind,
    pub options: Vec<String>,
}

impl VariationGroup {
    /// Size options are matched on their leading numeral.
    pub fn collapses_numerals(&self) -> bool {
        self.label == "Size"
    }
}

/// Collapse runs of whitespace (including non-breaking spaces) and trim.
pub fn clean_text(text: &str) -> String {
    WHITESPACE
        .replace_all(&text.replace('\u{a0}', " "), " ")
        .trim()
        .to_string()
}

fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Canonical attribute name for a raw variation label.
pub fn normalize_label(raw: &str) -> String {
    let text = clean_text(raw);
    let lower = text.to_lowercase();
    if lower.starts_with("banh") || lower.starts_with("material") {
        return "Material".to_string();
    }
    if lower.contains("cor") || lower.contains("color") {
        return "Color".to_string();
    }
    if lower.starts_with("taman")
        || lower.starts_with("size")
        || matches!(lower.as_str(), "numeração" | "numeracao" | "aro")
    {
        return "Size".to_string();
    }
    if text.is_empty() {
        "Option".to_string()
    } else {
        text
    }
}

/// Option text as stored; size options keep only their first numeral.
pub fn normalize_option(text: &str, collapse_numerals: bool) -> String {
    let text = clean_text(text);
    if collapse_numerals {
        if let Some(m) = SIZE_NUMERAL.captures(&text).and_then(|c| c.get(1)) {
            return m.as_str().to_string();
        }
    }
    text
}

/// Extract the scalar and list fields of a product page.
pub fn extract_fields(
    site: &CompiledSite,
    page_url: &str,
    html: &str,
    category: &str,
) -> ProductRecord {
    let doc = Html::parse_document(html);
    let area = doc.select(&site.detail).next();

    let first_text = |selector: &scraper::Selector| -> Option<String> {
        area.and_then(|a| a.select(selector).next())
            .or_else(|| doc.select(selector).next())
            .map(element_text)
            .filter(|t| !t.is_empty())
    };

    let title = site.titles.iter().find_map(|s| first_text(s));
    let description = first_text(&site.description);

    let scope = |selector: &scraper::Selector| scoped(&doc, area, selector);

    let mut images: Vec<String> = Vec::new();
    let mut push_image = |raw: &str| {
        let Some(url) = absolute_image(site, page_url, raw) else {
            return;
        };
        let excluded = site
            .profile
            .excluded_image_hosts
            .iter()
            .any(|host| url.contains(host.as_str()));
        if !excluded && !images.contains(&url) {
            images.push(url);
        }
    };
    for img in scope(&site.image) {
        if let Some(src) = img.value().attr("src") {
            push_image(src);
        }
    }
    for fig in scope(&site.background_image) {
        let style = fig.value().attr("style").unwrap_or_default();
        if let Some(m) = BACKGROUND_URL.captures(style).and_then(|c| c.get(1)) {
            push_image(m.as_str());
        }
    }

    let mut materials: Vec<String> = Vec::new();
    for item in scope(&site.material_item) {
        let text = element_text(item);
        if site.material.is_match(&text) && !materials.contains(&text) {
            materials.push(text);
        }
    }
    materials.truncate(site.profile.max_materials);

    let mut record = ProductRecord::new(page_url);
    record.title = title;
    record.description = description;
    record.images = images;
    record.materials = materials;
    if !category.is_empty() {
        record.categories.push(category.to_string());
    }
    record
}

fn scoped<'a>(
    doc: &'a Html,
    area: Option<ElementRef<'a>>,
    selector: &scraper::Selector,
) -> Vec<ElementRef<'a>> {
    match area {
        Some(a) => a.select(selector).collect(),
        None => doc.select(selector).collect(),
    }
}

fn absolute_image(site: &CompiledSite, page_url: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return None;
    }
    let base = url::Url::parse(page_url).unwrap_or_else(|_| site.base.clone());
    base.join(raw).ok().map(|u| u.to_string())
}

/// Whether the product detail block has rendered.
pub fn has_detail(site: &CompiledSite, html: &str) -> bool {
    Html::parse_document(html).select(&site.detail).next().is_some()
}

/// SKU shown for the current selection: the trailing token of the reference line.
pub fn read_sku(site: &CompiledSite, html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let text = element_text(doc.select(&site.sku).next()?);
    TRAILING_SKU
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Stock shown for the current selection (thousands separators ignored).
pub fn read_stock(site: &CompiledSite, html: &str) -> Option<u32> {
    let doc = Html::parse_document(html);
    let text = element_text(doc.select(&site.stock).next()?).replace('.', "");
    DIGITS
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Variation blocks with at least one option.
pub fn parse_variation_groups(site: &CompiledSite, html: &str) -> Vec<VariationGroup> {
    let doc = Html::parse_document(html);
    let mut groups = Vec::new();

    for (index, block) in doc.select(&site.variation_group).enumerate() {
        let raw_label = block
            .select(&site.variation_label)
            .next()
            .map(element_text)
            .unwrap_or_default();
        let label = normalize_label(&raw_label);
        let collapse = label == "Size";

        let mut options: Vec<String> = Vec::new();
        let mut kind = None;

        for chip in block.select(&site.variation_chip) {
            let text = normalize_option(&element_text(chip), collapse);
            if !text.is_empty() && !options.contains(&text) {
                options.push(text);
            }
        }
        if !options.is_empty() {
            kind = Some(GroupKind::Chips);
        }

        for select in block.select(&site.select) {
            for option in select.select(&site.option) {
                let raw = element_text(option);
                if raw.is_empty() || SELECT_PLACEHOLDERS.contains(&raw.to_lowercase().as_str()) {
                    continue;
                }
                let text = normalize_option(&raw, collapse);
                if !options.contains(&text) {
                    options.push(text);
                }
            }
            if !options.is_empty() && kind.is_none() {
                kind = Some(GroupKind::Select);
            }
        }

        if let Some(kind) = kind {
            groups.push(VariationGroup {
                index,
                label,
                kind,
                options,
            });
        }
    }
    groups
}
