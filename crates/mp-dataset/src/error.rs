//! Error types for dataset assembly.

use std::path::PathBuf;

use thiserror::Error;

/// Dataset assembly error type.
///
/// Every variant is fatal for the run.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// YAML parsing error
    #[error("YAML error in {path}: {source}")]
    Yaml {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        source: serde_yaml_ng::Error,
    },

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Table store error
    #[error(transparent)]
    Table(#[from] mp_table::TableError),

    /// Declared source files that do not exist.
    #[error("{} source file(s) do not exist: {}", .0.len(), display_paths(.0))]
    MissingSourceFiles(Vec<PathBuf>),

    /// No events before selection.
    #[error("chain for process '{process}' (source '{source_name}', fold {fold}) contains no events")]
    EmptyChain {
        /// Process key.
        process: String,
        /// Source label (`base` or friend alias).
        source_name: String,
        /// Fold index.
        fold: u64,
    },

    /// No events after selection.
    #[error(
        "selection '{selection}' keeps no events of process '{process}' (source '{source_name}', fold {fold})"
    )]
    EmptySelection {
        /// Process key.
        process: String,
        /// Source label (`base` or friend alias).
        source_name: String,
        /// Fold index.
        fold: u64,
        /// Effective selection (without the fold predicate).
        selection: String,
    },

    /// Merge tool failed.
    #[error("merge into {output} failed: {reason}")]
    MergeFailed {
        /// Merged output path.
        output: PathBuf,
        /// Exit status or error description.
        reason: String,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DatasetError>;
