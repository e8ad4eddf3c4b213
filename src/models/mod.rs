//! Data models for vitrine.

mod job;
mod product;

pub use job::Job;
pub use product::{
    common_sku_prefix, product_base_id, ProductRecord, VariantChild, Variation,
};
pub(crate) use product::has_text;
