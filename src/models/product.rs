//! Product records as observed on product pages and as persisted.
//!
//! The same type carries both a raw per-visit observation and a
//! consolidated record; consolidation only ever unions, fills or keeps.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Numeric product id embedded in product URLs (`/produto/123/` or `/produto/123:4/`).
static PRODUCT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/produto/(\d+)(?::\d+)?/").unwrap());

/// One variation attribute and the options offered for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variation {
    #[serde(rename = "atributo")]
    pub attribute: String,
    #[serde(rename = "opcoes", default)]
    pub options: Vec<String>,
}

impl Variation {
    pub fn new(attribute: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            attribute: attribute.into(),
            options,
        }
    }
}

/// A SKU-level variant of a product.
///
/// Serialized flat: `sku`, `estoque` and one key per attribute label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantChild {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(rename = "estoque", default)]
    pub stock: Option<u32>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl VariantChild {
    pub fn new(sku: Option<String>, stock: Option<u32>) -> Self {
        Self {
            sku,
            stock,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(label.into(), value.into());
        self
    }

    /// Non-empty SKU, if any.
    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Key under which two observations of this variant are considered the same.
    pub fn identity_key(&self) -> String {
        match self.sku() {
            Some(sku) => format!("SKU::{}", sku),
            None => {
                // BTreeMap serializes with sorted keys.
                let attrs = serde_json::to_string(&self.attributes).unwrap_or_default();
                format!("ATTRS::{}", attrs)
            }
        }
    }
}

/// A product, either one visit's observation or the consolidated result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sku_base: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub children: Vec<VariantChild>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl ProductRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Identity used to merge observations of the same product.
    pub fn canonical_id(&self) -> String {
        product_base_id(&self.url).unwrap_or_else(|| self.url.clone())
    }

    /// Whether the page yielded anything worth keeping.
    pub fn is_usable(&self) -> bool {
        has_text(&self.title) || has_text(&self.description) || !self.children.is_empty()
    }
}

/// Numeric product id from a product URL.
pub fn product_base_id(url: &str) -> Option<String> {
    PRODUCT_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Longest common prefix of all non-empty child SKUs.
pub fn common_sku_prefix(children: &[VariantChild]) -> Option<String> {
    let mut skus = children.iter().filter_map(VariantChild::sku);
    let first = skus.next()?;
    let mut prefix: Vec<char> = first.chars().collect();
    for sku in skus {
        let shared = prefix
            .iter()
            .zip(sku.chars())
            .take_while(|(a, b)| *a == b)
            .count();
        prefix.truncate(shared);
    }
    Some(prefix.into_iter().collect())
}

pub(crate) fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}
