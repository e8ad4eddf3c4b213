//! Merging of per-visit product observations into canonical records.
//!
//! Observations are grouped by [`ProductRecord::canonical_id`] in the order
//! they are first seen and folded in arrival order. Set-like fields are
//! order-preserving unions, scalar fields keep the first non-empty value,
//! and children are matched by [`VariantChild::identity_key`]. Feeding the
//! output back in yields the same output.

use std::collections::HashMap;

use crate::models::{common_sku_prefix, has_text, ProductRecord, VariantChild, Variation};

/// Merge observations into one record per canonical product.
pub fn consolidate<I>(observations: I) -> Vec<ProductRecord>
where
    I: IntoIterator<Item = ProductRecord>,
{
    let mut order: Vec<Product> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for observation in observations {
        if observation.url.trim().is_empty() {
            continue;
        }
        let id = observation.canonical_id();
        let slot = *index.entry(id).or_insert_with(|| {
            order.push(Product::seed(&observation));
            order.len() - 1
        });
        order[slot].absorb(observation);
    }

    order.into_iter().map(Product::finish).collect()
}

/// A record being assembled, with child lookup by identity key.
struct Product {
    record: ProductRecord,
    child_index: HashMap<String, usize>,
}

impl Product {
    fn seed(first: &ProductRecord) -> Self {
        Self {
            record: ProductRecord::new(first.url.clone()),
            child_index: HashMap::new(),
        }
    }

    fn absorb(&mut self, obs: ProductRecord) {
        let rec = &mut self.record;

        fill_text(&mut rec.title, obs.title);
        fill_text(&mut rec.description, obs.description);
        fill_text(&mut rec.sku_base, obs.sku_base);
        if rec.price.is_none() {
            rec.price = obs.price;
        }

        union_into(&mut rec.categories, obs.categories);
        union_into(&mut rec.images, obs.images);
        union_into(&mut rec.materials, obs.materials);

        for variation in obs.variations {
            merge_variation(&mut rec.variations, variation);
        }

        for child in obs.children {
            let key = child.identity_key();
            match self.child_index.get(&key) {
                Some(&i) => merge_child(&mut rec.children[i], child),
                None => {
                    self.child_index.insert(key, rec.children.len());
                    rec.children.push(child);
                }
            }
        }
    }

    fn finish(self) -> ProductRecord {
        let mut record = self.record;
        for child in &mut record.children {
            child.stock.get_or_insert(0);
        }
        record.sku_base = common_sku_prefix(&record.children);
        record
    }
}

fn fill_text(slot: &mut Option<String>, value: Option<String>) {
    if !has_text(slot) && has_text(&value) {
        *slot = value;
    }
}

fn union_into(target: &mut Vec<String>, values: Vec<String>) {
    for value in values {
        if !value.is_empty() && !target.contains(&value) {
            target.push(value);
        }
    }
}

fn merge_variation(target: &mut Vec<Variation>, incoming: Variation) {
    match target
        .iter_mut()
        .find(|v| v.attribute == incoming.attribute)
    {
        Some(existing) => union_into(&mut existing.options, incoming.options),
        None => {
            let mut fresh = Variation::new(incoming.attribute, Vec::new());
            union_into(&mut fresh.options, incoming.options);
            target.push(fresh);
        }
    }
}

/// Stock: an observed count replaces a missing one, and the larger count wins.
fn merge_child(existing: &mut VariantChild, incoming: VariantChild) {
    existing.stock = match (existing.stock, incoming.stock) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    if existing.sku().is_none() && incoming.sku().is_some() {
        existing.sku = incoming.sku;
    }
    for (label, value) in incoming.attributes {
        existing.attributes.entry(label).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(sku: Option<&str>, stock: Option<u32>) -> VariantChild {
        VariantChild::new(sku.map(String::from), stock)
    }

    fn observation(url: &str, category: &str) -> ProductRecord {
        let mut record = ProductRecord::new(url);
        record.categories = vec![category.to_string()];
        record
    }

    #[test]
    fn test_stock_keeps_larger_count() {
        let mut a = observation("https://s.example/produto/1/", "Rings");
        a.children = vec![child(Some("X1"), Some(5))];
        let mut b = observation("https://s.example/produto/1/", "Rings");
        b.children = vec![child(Some("X1"), Some(3))];

        let out = consolidate(vec![a.clone(), b.clone()]);
        assert_eq!(out[0].children[0].stock, Some(5));

        // Order of arrival does not matter.
        let out = consolidate(vec![b, a]);
        assert_eq!(out[0].children[0].stock, Some(5));
    }

    #[test]
    fn test_stock_fills_missing_and_defaults_to_zero() {
        let mut a = observation("https://s.example/produto/1/", "Rings");
        a.children = vec![child(Some("X1"), None), child(Some("X2"), None)];
        let mut b = observation("https://s.example/produto/1/", "Rings");
        b.children = vec![child(Some("X1"), Some(7))];

        let out = consolidate(vec![a, b]);
        let stocks: Vec<_> = out[0].children.iter().map(|c| c.stock).collect();
        assert_eq!(stocks, vec![Some(7), Some(0)]);
    }

    #[test]
    fn test_stock_missing_in_every_observation_is_zero() {
        let mut a = observation("https://s.example/produto/1/", "Rings");
        a.children = vec![child(Some("X1"), None)];
        let mut b = observation("https://s.example/produto/1/", "Bracelets");
        b.children = vec![child(Some("X1"), None)];

        let out = consolidate(vec![a, b]);
        assert_eq!(out[0].children.len(), 1);
        assert_eq!(out[0].children[0].stock, Some(0));
    }

    #[test]
    fn test_same_sku_merges_despite_attributes() {
        let mut a = observation("https://s.example/produto/1/", "Rings");
        a.children = vec![child(Some("X1"), Some(1)).with_attribute("Size", "12")];
        let mut b = observation("https://s.example/produto/1/", "Rings");
        b.children = vec![child(Some("X1"), Some(1)).with_attribute("Color", "Gold")];

        let out = consolidate(vec![a, b]);
        assert_eq!(out[0].children.len(), 1);
        let attrs = &out[0].children[0].attributes;
        assert_eq!(attrs.get("Size").map(String::as_str), Some("12"));
        assert_eq!(attrs.get("Color").map(String::as_str), Some("Gold"));
    }

    #[test]
    fn test_skuless_children_merge_only_on_equal_attributes() {
        let mut a = observation("https://s.example/produto/1/", "Rings");
        a.children = vec![
            child(None, Some(1)).with_attribute("Size", "12"),
            child(None, Some(2)).with_attribute("Size", "14"),
        ];
        let mut b = observation("https://s.example/produto/1/", "Rings");
        b.children = vec![child(None, Some(4)).with_attribute("Size", "12")];

        let out = consolidate(vec![a, b]);
        assert_eq!(out[0].children.len(), 2);
        assert_eq!(out[0].children[0].stock, Some(4));
        assert_eq!(out[0].sku_base, None);
    }

    #[test]
    fn test_unions_are_monotonic() {
        let mut a = observation("https://s.example/produto/1/", "Rings");
        a.images = vec!["https://img/1.jpg".into()];
        a.materials = vec!["Prata".into()];
        a.variations = vec![Variation::new("Size", vec!["12".into(), "14".into()])];
        let mut b = observation("https://s.example/produto/1/", "Bracelets");
        b.images = vec!["https://img/2.jpg".into(), "https://img/1.jpg".into()];
        b.materials = vec!["Ouro".into()];
        b.variations = vec![
            Variation::new("Size", vec!["16".into(), "12".into()]),
            Variation::new("Color", vec!["Gold".into()]),
        ];

        let out = consolidate(vec![a.clone(), b.clone()]);
        let merged = &out[0];
        for obs in [&a, &b] {
            for c in &obs.categories {
                assert!(merged.categories.contains(c));
            }
            for i in &obs.images {
                assert!(merged.images.contains(i));
            }
            for m in &obs.materials {
                assert!(merged.materials.contains(m));
            }
            for v in &obs.variations {
                let mv = merged
                    .variations
                    .iter()
                    .find(|m| m.attribute == v.attribute)
                    .unwrap();
                for o in &v.options {
                    assert!(mv.options.contains(o));
                }
            }
        }
        assert_eq!(merged.variations[0].options, vec!["12", "14", "16"]);
        assert_eq!(merged.variations[1].attribute, "Color");
    }

    #[test]
    fn test_first_non_empty_text_wins() {
        let mut a = observation("https://s.example/produto/1/", "Rings");
        a.title = Some("  ".into());
        let mut b = observation("https://s.example/produto/1/", "Rings");
        b.title = Some("Anel Solitário".into());
        b.description = Some("Prata 925".into());
        let mut c = observation("https://s.example/produto/1/", "Rings");
        c.title = Some("Outro".into());

        let out = consolidate(vec![a, b, c]);
        assert_eq!(out[0].title.as_deref(), Some("Anel Solitário"));
        assert_eq!(out[0].description.as_deref(), Some("Prata 925"));
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let mut a = observation("https://s.example/produto/1/", "Rings");
        a.title = Some("Anel".into());
        a.children = vec![
            child(Some("AN1-12"), None).with_attribute("Size", "12"),
            child(Some("AN1-14"), Some(2)).with_attribute("Size", "14"),
        ];
        let mut b = observation("https://s.example/produto/1:2/", "Bracelets");
        b.children = vec![child(Some("AN1-12"), Some(9))];
        let c = observation("https://s.example/p/other", "Rings");

        let once = consolidate(vec![a, b, c]);
        let twice = consolidate(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
        assert_eq!(once[0].sku_base.as_deref(), Some("AN1-1"));
    }

    #[test]
    fn test_observation_without_url_is_dropped() {
        let mut orphan = ProductRecord::new("");
        orphan.title = Some("nowhere".into());
        assert!(consolidate(vec![orphan]).is_empty());
    }
}
