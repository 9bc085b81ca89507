//! Named in-memory event tables backed by an Arrow [`RecordBatch`].

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float32Array};
use arrow::compute::{cast, filter_record_batch};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, SchemaRef, UInt64Type};
use arrow::record_batch::RecordBatch;

use crate::error::{Result, TableError};

/// Schema metadata key holding the table name.
pub const META_KEY_TABLE: &str = "mvaprep.table";

/// A named table of events (one row per event).
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    batch: RecordBatch,
}

impl Table {
    /// Wrap a record batch under `name`.
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self { name: name.into(), batch }
    }

    /// Build a table from `(column, array)` pairs.
    pub fn from_columns(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = (String, ArrayRef)>,
    ) -> Result<Self> {
        let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = columns
            .into_iter()
            .map(|(n, a)| (Field::new(n, a.data_type().clone(), a.null_count() > 0), a))
            .unzip();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(Self::new(name, batch))
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same rows under a different name.
    pub fn renamed(self, name: impl Into<String>) -> Self {
        Self { name: name.into(), batch: self.batch }
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Arrow schema (without the table-name metadata).
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Underlying record batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<&str> {
        self.batch.schema_ref().fields().iter().map(|f| f.name().as_str()).collect()
    }

    /// Whether a column named `name` exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema_ref().index_of(name).is_ok()
    }

    /// Raw column by name.
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// Numeric column converted to `f64`. Nulls read as NaN.
    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>> {
        let col = self.column(name).ok_or_else(|| TableError::UnknownColumn(name.into()))?;
        let dt = col.data_type();
        if !(dt.is_numeric() || *dt == DataType::Boolean) {
            return Err(TableError::ColumnType {
                name: name.into(),
                expected: "numeric",
                actual: dt.to_string(),
            });
        }
        let as_f64 = cast(col, &DataType::Float64)?;
        let arr = as_f64.as_primitive::<Float64Type>();
        Ok((0..arr.len()).map(|i| if arr.is_null(i) { f64::NAN } else { arr.value(i) }).collect())
    }

    /// Integer column converted to `i64`.
    ///
    /// Floating-point columns are rejected, as are nulls and unsigned values
    /// above `i64::MAX`.
    pub fn column_i64(&self, name: &str) -> Result<Vec<i64>> {
        let col = self.integer_column(name)?;
        let as_i64 = cast(col, &DataType::Int64)?;
        if as_i64.null_count() > 0 {
            return Err(TableError::ColumnType {
                name: name.into(),
                expected: "integer within i64 range",
                actual: format!(
                    "{} with {} values above i64::MAX",
                    col.data_type(),
                    as_i64.null_count()
                ),
            });
        }
        Ok(as_i64.as_primitive::<Int64Type>().values().to_vec())
    }

    /// Integer column reduced modulo `k` into `0..k`.
    ///
    /// Signed values wrap (`-1 mod 2 == 1`). Unsigned values are reduced as
    /// `u64`, so ids above `i64::MAX` keep their residue.
    pub fn column_mod(&self, name: &str, k: NonZeroU64) -> Result<Vec<u64>> {
        let col = self.integer_column(name)?;
        let k = k.get();
        if col.data_type().is_unsigned_integer() {
            let as_u64 = cast(col, &DataType::UInt64)?;
            let values = as_u64.as_primitive::<UInt64Type>().values();
            return Ok(values.iter().map(|v| v % k).collect());
        }
        let as_i64 = cast(col, &DataType::Int64)?;
        let k = i128::from(k);
        Ok(as_i64
            .as_primitive::<Int64Type>()
            .values()
            .iter()
            .map(|&v| i128::from(v).rem_euclid(k) as u64)
            .collect())
    }

    fn integer_column(&self, name: &str) -> Result<&ArrayRef> {
        let col = self.column(name).ok_or_else(|| TableError::UnknownColumn(name.into()))?;
        if !col.data_type().is_integer() {
            return Err(TableError::ColumnType {
                name: name.into(),
                expected: "integer",
                actual: col.data_type().to_string(),
            });
        }
        if col.null_count() > 0 {
            return Err(TableError::ColumnType {
                name: name.into(),
                expected: "non-null integer",
                actual: format!("{} with {} nulls", col.data_type(), col.null_count()),
            });
        }
        Ok(col)
    }

    /// Keep rows where `mask` is true, preserving row order.
    pub fn filter(&self, mask: &[bool]) -> Result<Table> {
        let predicate = BooleanArray::from(mask.to_vec());
        let batch = filter_record_batch(&self.batch, &predicate)?;
        Ok(Self { name: self.name.clone(), batch })
    }

    /// Append a single-precision float column.
    pub fn with_f32_column(&self, name: &str, values: Vec<f32>) -> Result<Table> {
        if self.has_column(name) {
            return Err(TableError::ColumnExists(name.into()));
        }
        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        fields.push(Field::new(name, DataType::Float32, false));
        let mut columns = self.batch.columns().to_vec();
        columns.push(Arc::new(Float32Array::from(values)));
        let schema = Schema::new(fields).with_metadata(schema.metadata().clone());
        let batch = RecordBatch::try_new(Arc::new(schema), columns)?;
        Ok(Self { name: self.name.clone(), batch })
    }

    /// Record batch whose schema carries the table name as metadata.
    pub fn to_named_batch(&self) -> Result<RecordBatch> {
        let schema = self.batch.schema();
        let mut metadata: HashMap<String, String> = schema.metadata().clone();
        metadata.insert(META_KEY_TABLE.to_string(), self.name.clone());
        let schema = Schema::new(schema.fields().clone()).with_metadata(metadata);
        Ok(self.batch.clone().with_schema(Arc::new(schema))?)
    }
}
