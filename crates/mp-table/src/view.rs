//! Positional joins of a target table with its friends.
//!
//! A [`JoinedView`] borrows one target table and any number of friend
//! tables with the same row count. Row `i` of every friend is assumed to
//! describe the same event as row `i` of the target. Views are cheap and
//! immutable; build a fresh one for every target.

use std::num::NonZeroU64;

use crate::error::{Result, TableError};
use crate::expr::{CompiledExpr, is_selected};
use crate::table::Table;

#[derive(Debug, Clone, Copy)]
struct Friend<'a> {
    alias: Option<&'a str>,
    table: &'a Table,
}

/// Target table plus positionally aligned friends.
#[derive(Debug, Clone)]
pub struct JoinedView<'a> {
    target: &'a Table,
    friends: Vec<Friend<'a>>,
}

impl<'a> JoinedView<'a> {
    /// View over `target` alone.
    pub fn new(target: &'a Table) -> Self {
        Self { target, friends: Vec::new() }
    }

    /// Bind `table` as a friend. `None` binds it without an alias, so its
    /// columns are reachable only by their bare names.
    pub fn with_friend(mut self, alias: Option<&'a str>, table: &'a Table) -> Result<Self> {
        if table.num_rows() != self.target.num_rows() {
            return Err(TableError::FriendLengthMismatch {
                alias: alias.unwrap_or_default().to_string(),
                target: self.target.name().to_string(),
                expected: self.target.num_rows(),
                actual: table.num_rows(),
            });
        }
        self.friends.push(Friend { alias, table });
        Ok(self)
    }

    /// The target table.
    pub fn target(&self) -> &'a Table {
        self.target
    }

    /// Aliases of bound friends, in binding order (`None` for alias-less friends).
    pub fn friend_aliases(&self) -> Vec<Option<&'a str>> {
        self.friends.iter().map(|f| f.alias).collect()
    }

    /// Number of rows (identical for target and friends).
    pub fn num_rows(&self) -> usize {
        self.target.num_rows()
    }

    /// Find the table and local column name a reference resolves to.
    ///
    /// `alias.col` looks only at the friend bound as `alias`. A bare name is
    /// looked up in the target, then alias-less friends, then aliased friends.
    pub fn resolve(&self, name: &str) -> Result<(&'a Table, String)> {
        if let Some((alias, col)) = name.split_once('.') {
            let hit = self
                .friends
                .iter()
                .find(|f| f.alias == Some(alias) && f.table.has_column(col));
            if let Some(f) = hit {
                return Ok((f.table, col.to_string()));
            }
        }
        if self.target.has_column(name) {
            return Ok((self.target, name.to_string()));
        }
        let bare = self.friends.iter().filter(|f| f.alias.is_none());
        let aliased = self.friends.iter().filter(|f| f.alias.is_some());
        bare.chain(aliased)
            .find(|f| f.table.has_column(name))
            .map(|f| (f.table, name.to_string()))
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    /// Column values as `f64`.
    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>> {
        let (table, col) = self.resolve(name)?;
        table.column_f64(&col)
    }

    /// Integer column values.
    pub fn column_i64(&self, name: &str) -> Result<Vec<i64>> {
        let (table, col) = self.resolve(name)?;
        table.column_i64(&col)
    }

    /// Integer column values modulo `k`; see [`Table::column_mod`].
    pub fn column_mod(&self, name: &str, k: NonZeroU64) -> Result<Vec<u64>> {
        let (table, col) = self.resolve(name)?;
        table.column_mod(&col, k)
    }

    /// Evaluate `expr` for every row.
    ///
    /// All referenced columns are resolved before any row is evaluated.
    pub fn evaluate(&self, expr: &CompiledExpr) -> Result<Vec<f64>> {
        let columns = expr
            .required_branches
            .iter()
            .map(|b| self.column_f64(b))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&[f64]> = columns.iter().map(Vec::as_slice).collect();
        Ok(expr.eval_bulk(&refs, self.num_rows()))
    }

    /// Selection mask for `expr` (finite, non-zero values pass).
    pub fn mask(&self, expr: &CompiledExpr) -> Result<Vec<bool>> {
        Ok(self.evaluate(expr)?.into_iter().map(is_selected).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int64Array};
    use std::sync::Arc;

    fn table(name: &str, cols: &[(&str, Vec<f64>)]) -> Table {
        Table::from_columns(
            name,
            cols.iter()
                .map(|(n, v)| (n.to_string(), Arc::new(Float64Array::from(v.clone())) as ArrayRef)),
        )
        .unwrap()
    }

    #[test]
    fn resolves_qualified_and_bare_names() {
        let base = Table::from_columns(
            "ntuple",
            vec![
                ("event".to_string(), Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
                ("pt".to_string(), Arc::new(Float64Array::from(vec![10.0, 20.0, 30.0]))),
            ],
        )
        .unwrap();
        let nn = table("ntuple", &[("score", vec![0.1, 0.9, 0.6]), ("pt", vec![-1.0; 3])]);
        let view = JoinedView::new(&base).with_friend(Some("nn"), &nn).unwrap();

        assert_eq!(view.column_f64("nn.score").unwrap(), vec![0.1, 0.9, 0.6]);
        assert_eq!(view.column_f64("score").unwrap(), vec![0.1, 0.9, 0.6]);
        // Target wins for bare names.
        assert_eq!(view.column_f64("pt").unwrap(), vec![10.0, 20.0, 30.0]);
        assert_eq!(view.column_f64("nn.pt").unwrap(), vec![-1.0; 3]);
        assert!(matches!(view.column_f64("svfit.m"), Err(TableError::UnknownColumn(_))));

        let cut = CompiledExpr::compile("nn.score > 0.5 && pt > 15").unwrap();
        assert_eq!(view.mask(&cut).unwrap(), vec![false, true, true]);
    }

    #[test]
    fn friend_as_target_sees_base_unqualified() {
        let base = table("ntuple", &[("pt", vec![10.0, 40.0])]);
        let nn = table("ntuple", &[("score", vec![0.7, 0.2])]);
        let view = JoinedView::new(&nn).with_friend(None, &base).unwrap();
        let cut = CompiledExpr::compile("score > 0.5 && pt > 5").unwrap();
        assert_eq!(view.mask(&cut).unwrap(), vec![true, false]);
        assert_eq!(view.friend_aliases(), vec![None]);
    }

    #[test]
    fn friend_row_count_must_match() {
        let base = table("ntuple", &[("pt", vec![1.0, 2.0])]);
        let nn = table("ntuple", &[("score", vec![0.5])]);
        let err = JoinedView::new(&base).with_friend(Some("nn"), &nn).unwrap_err();
        assert!(matches!(err, TableError::FriendLengthMismatch { expected: 2, actual: 1, .. }));
    }
}
