//! JSON output of consolidated records.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use tempfile::NamedTempFile;

use crate::error::CrawlError;
use crate::models::ProductRecord;

/// Write records as a pretty-printed JSON array, replacing `path` atomically.
///
/// The data goes to a temporary file in the target directory first, so a
/// reader never observes a partially written file.
pub fn write_json_atomic(path: &Path, records: &[ProductRecord]) -> Result<(), CrawlError> {
    let body = serde_json::to_string_pretty(records)?;
    let persist_err = |source: std::io::Error| CrawlError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(persist_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(persist_err)?;
    tmp.write_all(body.as_bytes()).map_err(persist_err)?;
    tmp.write_all(b"\n").map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}

/// Read a previously written output file.
pub fn read_records(path: &Path) -> anyhow::Result<Vec<ProductRecord>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}
