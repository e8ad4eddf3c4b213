//! Error types for page automation and crawl cycles.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single automation step against a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no usable content at {url}")]
    TransientFetch { url: String },
    #[error("navigation to {url} timed out")]
    NavigationTimeout { url: String },
    #[error("variant enumeration failed: {0}")]
    Extraction(String),
    #[error("gave up on {url} after {attempts} attempts")]
    PermanentFetch { url: String, attempts: u32 },
    #[error("driver error: {0}")]
    Driver(String),
}

impl FetchError {
    /// Whether another attempt at the same page may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::TransientFetch { .. }
                | FetchError::NavigationTimeout { .. }
                | FetchError::Driver(_)
        )
    }
}

/// Failure that aborts a whole crawl cycle.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("could not start page driver: {0}")]
    Driver(#[from] FetchError),
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to write {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid base url {0:?}")]
    BaseUrl(String),
}
