//! Vitrine - authenticated product catalog crawler.
//!
//! Logs into a storefront with a real browser, discovers every product
//! listed under the configured categories, walks each product's variant
//! matrix with a pool of workers, and writes one consolidated JSON catalog.

pub mod auth;
pub mod cli;
pub mod config;
pub mod consolidate;
pub mod crawl;
pub mod cycle;
pub mod driver;
pub mod error;
pub mod extract;
pub mod models;
pub mod persist;
pub mod site;

pub use config::Config;
pub use consolidate::consolidate;
pub use cycle::{run_cycle, CycleReport};
pub use error::{CrawlError, FetchError};
pub use models::{Job, ProductRecord, VariantChild, Variation};
