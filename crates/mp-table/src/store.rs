//! Persistent table storage.
//!
//! [`EventStore`] is the seam between the dataset pipeline and the file
//! format. [`ParquetStore`] keeps one table per Parquet file, with the
//! table name in the Arrow schema metadata under [`META_KEY_TABLE`].

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::{Result, TableError};
use crate::table::{META_KEY_TABLE, Table};

/// Storage backend for event tables.
pub trait EventStore {
    /// Read the table stored at `path`.
    ///
    /// Files that do not record a table name are returned under `fallback_name`.
    fn read(&self, path: &Path, fallback_name: &str) -> Result<Table>;

    /// Number of rows stored at `path`, without decoding column data.
    fn count(&self, path: &Path) -> Result<u64>;

    /// Name recorded for the table at `path`, if any.
    fn table_name(&self, path: &Path) -> Result<Option<String>>;

    /// Write `table` to `path`, replacing any existing file.
    fn write(&self, path: &Path, table: &Table) -> Result<()>;
}

/// Parquet-backed [`EventStore`].
#[derive(Debug, Clone)]
pub struct ParquetStore {
    compression: Compression,
}

impl Default for ParquetStore {
    fn default() -> Self {
        Self { compression: Compression::SNAPPY }
    }
}

impl ParquetStore {
    /// Store writing with the given compression codec.
    pub fn with_compression(compression: Compression) -> Self {
        Self { compression }
    }

    fn open(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
        let file = File::open(path).map_err(|source| TableError::Io { path: path.into(), source })?;
        Ok(ParquetRecordBatchReaderBuilder::try_new(file)?)
    }
}

impl EventStore for ParquetStore {
    fn read(&self, path: &Path, fallback_name: &str) -> Result<Table> {
        let builder = Self::open(path)?;
        let schema = builder.schema().clone();
        let name = schema.metadata().get(META_KEY_TABLE).cloned();
        let batches: Vec<RecordBatch> =
            builder.build()?.collect::<std::result::Result<_, arrow::error::ArrowError>>()?;

        let mut metadata = schema.metadata().clone();
        metadata.remove(META_KEY_TABLE);
        let schema = Arc::new(Schema::new(schema.fields().clone()).with_metadata(metadata));
        let batch = concat_batches(&schema, &batches)?;
        tracing::trace!(path = %path.display(), rows = batch.num_rows(), "read table");
        Ok(Table::new(name.unwrap_or_else(|| fallback_name.to_string()), batch))
    }

    fn count(&self, path: &Path) -> Result<u64> {
        let builder = Self::open(path)?;
        Ok(builder.metadata().file_metadata().num_rows().max(0) as u64)
    }

    fn table_name(&self, path: &Path) -> Result<Option<String>> {
        let builder = Self::open(path)?;
        Ok(builder.schema().metadata().get(META_KEY_TABLE).cloned())
    }

    fn write(&self, path: &Path, table: &Table) -> Result<()> {
        let batch = table.to_named_batch()?;
        let props = WriterProperties::builder().set_compression(self.compression).build();
        let file =
            File::create(path).map_err(|source| TableError::Io { path: path.into(), source })?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        tracing::trace!(
            path = %path.display(),
            table = table.name(),
            rows = table.num_rows(),
            "wrote table"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int64Array};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_path(name: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("mp_table_{}_{}_{}", std::process::id(), nanos, name))
    }

    #[test]
    fn write_read_keeps_name_and_rows() {
        let t = Table::from_columns(
            "ntuple",
            vec![
                ("event".to_string(), Arc::new(Int64Array::from(vec![5, 6, 7])) as ArrayRef),
                ("pt".to_string(), Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0]))),
            ],
        )
        .unwrap();
        let path = tmp_path("rw.parquet");
        let store = ParquetStore::default();
        store.write(&path, &t).unwrap();

        assert_eq!(store.count(&path).unwrap(), 3);
        assert_eq!(store.table_name(&path).unwrap().as_deref(), Some("ntuple"));
        let back = store.read(&path, "other").unwrap();
        assert_eq!(back.name(), "ntuple");
        assert_eq!(back.column_i64("event").unwrap(), vec![5, 6, 7]);
        assert!(back.schema().metadata().get(META_KEY_TABLE).is_none());

        // RECREATE: a second write replaces the file.
        let smaller = t.filter(&[true, false, false]).unwrap().renamed("ggh");
        store.write(&path, &smaller).unwrap();
        assert_eq!(store.count(&path).unwrap(), 1);
        assert_eq!(store.read(&path, "x").unwrap().name(), "ggh");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_io_error() {
        let store = ParquetStore::default();
        let err = store.count(Path::new("/definitely/not/here.parquet")).unwrap_err();
        assert!(matches!(err, TableError::Io { .. }));
    }
}
