use std::path::{Path, PathBuf};

use anyhow::Context;
use console::style;

use crate::consolidate::consolidate;
use crate::persist::{read_records, write_json_atomic};

/// Merge earlier outputs with the consolidation rules.
pub fn cmd_consolidate(inputs: &[PathBuf], out: &Path) -> anyhow::Result<()> {
    let mut observations = Vec::new();
    for input in inputs {
        let records = read_records(input)?;
        println!(
            "  {} {} ({} records)",
            style("•").dim(),
            input.display(),
            records.len()
        );
        observations.extend(records);
    }

    let total = observations.len();
    let merged = consolidate(observations);
    write_json_atomic(out, &merged)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!(
        "{} {} records merged into {} products → {}",
        style("✓").green(),
        total,
        merged.len(),
        out.display()
    );
    Ok(())
}
