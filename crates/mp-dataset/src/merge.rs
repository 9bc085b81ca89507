//! Cross-process merging of output units.
//!
//! [`NativeMerge`] concatenates Parquet units in-process; [`CommandMerge`]
//! hands the file list to an external program in the style of
//! `hadd -f <output> <inputs...>`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use mp_table::{EventStore, Table};

use crate::config::SourceDir;
use crate::error::{DatasetError, Result};
use crate::writer::OUTPUT_EXTENSION;

/// Column holding each row's class label in natively merged files.
pub const CLASS_COLUMN: &str = "_class";

/// Table name of natively merged files.
pub const MERGED_TABLE: &str = "merged";

/// A merged (source, fold) output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedOutput {
    /// Source index (0 = base).
    pub source: usize,
    /// Fold index.
    pub fold: u64,
    /// File path.
    pub path: PathBuf,
    /// Units that went into it.
    pub inputs: Vec<PathBuf>,
    /// Total rows of the inputs.
    pub rows: usize,
}

/// Path of the merged file for (`source`, `fold`).
///
/// Base: `fold{f}_{output_filename}`; friend: `{alias}_fold{f}_{output_filename}`.
/// The name gets a `.parquet` extension when it has none.
pub fn merged_path(
    output_path: &Path,
    source: &SourceDir,
    fold: u64,
    output_filename: &str,
) -> PathBuf {
    let mut name = format!("fold{fold}_{output_filename}");
    if Path::new(output_filename).extension().is_none() {
        name = format!("{name}.{OUTPUT_EXTENSION}");
    }
    match &source.alias {
        None => output_path.join(name),
        Some(alias) => output_path.join(format!("{alias}_{name}")),
    }
}

/// Combines the units of one (source, fold) into one file.
pub trait MergeTool {
    /// Merge `inputs` into `output`, replacing any existing file.
    fn merge(&self, output: &Path, inputs: &[PathBuf]) -> Result<()>;
}

/// In-process concatenation through an [`EventStore`].
///
/// Rows keep input order; a `_class` column records the table name (class
/// label) of the unit each row came from.
pub struct NativeMerge<'a> {
    store: &'a dyn EventStore,
}

impl<'a> NativeMerge<'a> {
    /// Merger reading and writing through `store`.
    pub fn new(store: &'a dyn EventStore) -> Self {
        Self { store }
    }
}

impl MergeTool for NativeMerge<'_> {
    fn merge(&self, output: &Path, inputs: &[PathBuf]) -> Result<()> {
        let failed = |reason: String| DatasetError::MergeFailed { output: output.into(), reason };
        let Some(first) = inputs.first() else {
            return Err(failed("no input files".into()));
        };

        let mut tables = Vec::with_capacity(inputs.len());
        for path in inputs {
            tables.push(self.store.read(path, MERGED_TABLE)?);
        }

        // Columns follow the first unit; nullability is the union over units.
        let first_schema = tables[0].schema();
        let mut fields: Vec<Field> =
            first_schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        for (path, t) in inputs.iter().zip(&tables) {
            if t.has_column(CLASS_COLUMN) {
                return Err(failed(format!(
                    "{} already has a '{CLASS_COLUMN}' column",
                    path.display()
                )));
            }
            let schema = t.schema();
            if schema.fields().len() != fields.len() {
                return Err(failed(format!(
                    "{} has {} columns, {} has {}",
                    path.display(),
                    schema.fields().len(),
                    first.display(),
                    fields.len()
                )));
            }
            for field in fields.iter_mut() {
                let Ok(other) = schema.field_with_name(field.name()) else {
                    return Err(failed(format!(
                        "{} has no column '{}'",
                        path.display(),
                        field.name()
                    )));
                };
                if other.data_type() != field.data_type() {
                    return Err(failed(format!(
                        "column '{}' is {} in {} but {} in {}",
                        field.name(),
                        other.data_type(),
                        path.display(),
                        field.data_type(),
                        first.display()
                    )));
                }
                if other.is_nullable() && !field.is_nullable() {
                    *field = field.clone().with_nullable(true);
                }
            }
        }

        let names: Vec<String> = fields.iter().map(|f| f.name().clone()).collect();
        fields.push(Field::new(CLASS_COLUMN, DataType::Utf8, false));
        let schema = Arc::new(Schema::new(fields));

        let mut batches = Vec::with_capacity(tables.len());
        for (path, t) in inputs.iter().zip(&tables) {
            let mut arrays = Vec::with_capacity(schema.fields().len());
            for name in &names {
                let column = t.column(name).cloned().ok_or_else(|| {
                    failed(format!("{} has no column '{name}'", path.display()))
                })?;
                arrays.push(column);
            }
            let labels: ArrayRef =
                Arc::new(StringArray::from(vec![t.name().to_string(); t.num_rows()]));
            arrays.push(labels);
            batches.push(RecordBatch::try_new(schema.clone(), arrays)?);
        }
        let batch = concat_batches(&schema, &batches)?;
        self.store.write(output, &Table::new(MERGED_TABLE, batch))?;
        Ok(())
    }
}

/// External merge program.
///
/// Runs `program args... <output> <inputs...>` and waits for it; a non-zero
/// exit status fails the merge.
#[derive(Debug, Clone)]
pub struct CommandMerge {
    program: String,
    args: Vec<String>,
}

impl CommandMerge {
    /// Command from a `[program, args...]` list.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self { program: program.clone(), args: args.to_vec() })
    }
}

impl MergeTool for CommandMerge {
    fn merge(&self, output: &Path, inputs: &[PathBuf]) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(output).args(inputs);
        tracing::debug!(command = ?cmd, "call merge tool");
        let status = cmd.status().map_err(|e| DatasetError::MergeFailed {
            output: output.into(),
            reason: format!("failed to run '{}': {e}", self.program),
        })?;
        if !status.success() {
            return Err(DatasetError::MergeFailed {
                output: output.into(),
                reason: format!("'{}' exited with {status}", self.program),
            });
        }
        Ok(())
    }
}
