//! Per-(process, source, fold) output units.

use std::path::{Path, PathBuf};

use mp_table::{EventStore, Table};

use crate::config::SourceDir;
use crate::error::Result;

/// File extension of every file the pipeline writes.
pub const OUTPUT_EXTENSION: &str = "parquet";

/// A written output unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputUnit {
    /// Process key.
    pub process: String,
    /// Source index (0 = base).
    pub source: usize,
    /// Fold index.
    pub fold: u64,
    /// File path.
    pub path: PathBuf,
    /// Rows written.
    pub rows: usize,
}

/// Path of the unit for (`process`, `source`, `fold`).
///
/// Base: `merge_fold{f}_{process}.parquet`; friend: `{alias}_merge_fold{f}_{process}.parquet`.
pub fn unit_path(output_path: &Path, source: &SourceDir, fold: u64, process: &str) -> PathBuf {
    let stem = format!("merge_fold{fold}_{process}.{OUTPUT_EXTENSION}");
    match &source.alias {
        None => output_path.join(stem),
        Some(alias) => output_path.join(format!("{alias}_{stem}")),
    }
}

/// Write `table` renamed to `class_name`, replacing any file at `path`.
pub fn write_unit(
    store: &dyn EventStore,
    path: &Path,
    table: Table,
    class_name: &str,
) -> Result<usize> {
    tracing::debug!(
        path = %path.display(),
        class = class_name,
        "write output file for this process and fold"
    );
    let table = table.renamed(class_name);
    store.write(path, &table)?;
    Ok(table.num_rows())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_naming_convention() {
        let out = Path::new("/out");
        let base = SourceDir { index: 0, alias: None, dir: PathBuf::from("b") };
        let nn = SourceDir { index: 1, alias: Some("nn".into()), dir: PathBuf::from("n") };
        assert_eq!(unit_path(out, &base, 0, "ggh"), PathBuf::from("/out/merge_fold0_ggh.parquet"));
        assert_eq!(unit_path(out, &nn, 1, "ztt"), PathBuf::from("/out/nn_merge_fold1_ztt.parquet"));
    }
}
