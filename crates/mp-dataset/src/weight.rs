//! Training weight injection for the primary source.

use mp_table::{CompiledExpr, JoinedView, Table};

use crate::error::Result;

/// Value a weight slot holds until the filling pass writes it.
pub const WEIGHT_SENTINEL: f32 = -999.0;

/// Append `branch` to `table`, holding `formula` evaluated on each row.
///
/// The formula sees only the table's own columns. Values are stored as
/// single-precision floats in row order.
pub fn inject_training_weight(
    table: &Table,
    formula: &CompiledExpr,
    branch: &str,
) -> Result<Table> {
    tracing::debug!(weight = %formula, branch, "add training weights");
    let values = JoinedView::new(table).evaluate(formula)?;

    let mut weights = vec![WEIGHT_SENTINEL; table.num_rows()];
    for (slot, v) in weights.iter_mut().zip(values) {
        *slot = v as f32;
    }
    Ok(table.with_f32_column(branch, weights)?)
}
