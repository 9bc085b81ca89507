//! Error types for table I/O, joins and expression evaluation.

use std::path::PathBuf;

use thiserror::Error;

/// Table error type.
#[derive(Error, Debug)]
pub enum TableError {
    /// I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet read/write error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Expression parse error
    #[error("Expression error: {0}")]
    Expression(String),

    /// File holds a table with a different name than requested.
    #[error("table '{expected}' not found in {path} (file holds '{found}')")]
    TableNotFound {
        /// Requested table name.
        expected: String,
        /// Table name stored in the file.
        found: String,
        /// File path.
        path: PathBuf,
    },

    /// Column referenced by an expression or lookup does not exist.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// Column exists but cannot be used as requested.
    #[error("column '{name}' has type {actual}, expected {expected}")]
    ColumnType {
        /// Column name.
        name: String,
        /// Expected type family.
        expected: &'static str,
        /// Actual Arrow data type.
        actual: String,
    },

    /// Column would shadow an existing one.
    #[error("column '{0}' already exists")]
    ColumnExists(String),

    /// Friend tables must be row-aligned with their target.
    #[error("friend '{alias}' has {actual} rows, target '{target}' has {expected}")]
    FriendLengthMismatch {
        /// Friend alias (empty for the alias-less friend).
        alias: String,
        /// Target table name.
        target: String,
        /// Target row count.
        expected: usize,
        /// Friend row count.
        actual: usize,
    },

    /// Files of one chain disagree on their columns.
    #[error("schema mismatch in chain '{table}': {path} differs from the first file")]
    SchemaMismatch {
        /// Table name.
        table: String,
        /// Offending file.
        path: PathBuf,
    },

    /// Chain has no files attached.
    #[error("chain '{0}' has no files")]
    EmptyChain(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TableError>;
