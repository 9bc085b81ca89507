//! Chains: several files holding the same table, read as one row sequence.

use std::path::{Path, PathBuf};

use arrow::compute::concat_batches;

use crate::error::{Result, TableError};
use crate::store::EventStore;
use crate::table::Table;

/// Ordered list of files that together make up one logical table.
#[derive(Debug, Clone)]
pub struct Chain {
    table_name: String,
    files: Vec<PathBuf>,
}

impl Chain {
    /// Empty chain for the table `table_name`.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self { table_name: table_name.into(), files: Vec::new() }
    }

    /// Append a file; rows are read in the order files were added.
    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.files.push(path.into());
        self
    }

    /// Table name this chain reads.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Files in chain order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Total number of rows over all files.
    pub fn count(&self, store: &dyn EventStore) -> Result<u64> {
        let mut total = 0u64;
        for path in &self.files {
            self.check_name(store, path)?;
            total += store.count(path)?;
        }
        Ok(total)
    }

    /// Read and concatenate every file into one table.
    pub fn load(&self, store: &dyn EventStore) -> Result<Table> {
        let Some(first_path) = self.files.first() else {
            return Err(TableError::EmptyChain(self.table_name.clone()));
        };
        let mut parts = Vec::with_capacity(self.files.len());
        for path in &self.files {
            let t = store.read(path, &self.table_name)?;
            if t.name() != self.table_name {
                return Err(TableError::TableNotFound {
                    expected: self.table_name.clone(),
                    found: t.name().to_string(),
                    path: path.clone(),
                });
            }
            parts.push((path, t));
        }

        let schema = parts[0].1.schema();
        for (path, t) in &parts[1..] {
            if t.schema().fields() != schema.fields() {
                return Err(TableError::SchemaMismatch {
                    table: self.table_name.clone(),
                    path: path.to_path_buf(),
                });
            }
        }
        let batch = concat_batches(&schema, parts.iter().map(|(_, t)| t.batch()))?;
        tracing::trace!(
            table = %self.table_name,
            first = %first_path.display(),
            files = self.files.len(),
            rows = batch.num_rows(),
            "loaded chain"
        );
        Ok(Table::new(self.table_name.clone(), batch))
    }

    fn check_name(&self, store: &dyn EventStore, path: &Path) -> Result<()> {
        match store.table_name(path)? {
            Some(found) if found != self.table_name => Err(TableError::TableNotFound {
                expected: self.table_name.clone(),
                found,
                path: path.to_path_buf(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ParquetStore;
    use arrow::array::{ArrayRef, Float64Array, Int64Array};
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let p = std::env::temp_dir().join(format!(
            "mp_chain_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ));
        std::fs::create_dir_all(&p).unwrap();
        p
    }

    fn events(name: &str, ids: Vec<i64>) -> Table {
        let pt: Vec<f64> = ids.iter().map(|&i| i as f64 * 10.0).collect();
        Table::from_columns(
            name,
            vec![
                ("event".to_string(), Arc::new(Int64Array::from(ids)) as ArrayRef),
                ("pt".to_string(), Arc::new(Float64Array::from(pt))),
            ],
        )
        .unwrap()
    }

    #[test]
    fn concatenates_in_file_order() {
        let dir = tmp_dir("order");
        let store = ParquetStore::default();
        store.write(&dir.join("b.parquet"), &events("ntuple", vec![3, 4])).unwrap();
        store.write(&dir.join("a.parquet"), &events("ntuple", vec![1, 2])).unwrap();

        let mut chain = Chain::new("ntuple");
        chain.add_file(dir.join("b.parquet")).add_file(dir.join("a.parquet"));
        assert_eq!(chain.count(&store).unwrap(), 4);
        let t = chain.load(&store).unwrap();
        assert_eq!(t.column_i64("event").unwrap(), vec![3, 4, 1, 2]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn wrong_table_name_is_rejected() {
        let dir = tmp_dir("name");
        let store = ParquetStore::default();
        store.write(&dir.join("a.parquet"), &events("other", vec![1])).unwrap();

        let mut chain = Chain::new("ntuple");
        chain.add_file(dir.join("a.parquet"));
        assert!(matches!(chain.count(&store), Err(TableError::TableNotFound { .. })));
        assert!(matches!(chain.load(&store), Err(TableError::TableNotFound { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_chain_cannot_load() {
        let chain = Chain::new("ntuple");
        assert!(matches!(chain.load(&ParquetStore::default()), Err(TableError::EmptyChain(_))));
    }
}
