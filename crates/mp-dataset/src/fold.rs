//! Fold assignment and event selection.

use std::num::NonZeroU64;

use mp_table::{CompiledExpr, JoinedView, Table};

use crate::config::SourceDir;
use crate::error::{DatasetError, Result};

/// Splits events into folds by `event mod K` and applies a process cut.
#[derive(Debug, Clone)]
pub struct FoldSelector {
    event_branch: String,
    num_folds: NonZeroU64,
}

impl FoldSelector {
    /// Selector over the integer column `event_branch` with `num_folds` folds.
    ///
    /// Fails with [`DatasetError::Config`] when `num_folds` is zero.
    pub fn new(event_branch: impl Into<String>, num_folds: u64) -> Result<Self> {
        let num_folds = NonZeroU64::new(num_folds)
            .ok_or_else(|| DatasetError::Config("fold count must be positive".into()))?;
        Ok(Self { event_branch: event_branch.into(), num_folds })
    }

    /// Number of folds.
    pub fn num_folds(&self) -> u64 {
        self.num_folds.get()
    }

    /// Cut as seen from `target`: a friend's own `alias.` prefix is dropped.
    pub fn cut_for_target(cut: &CompiledExpr, target: &SourceDir) -> CompiledExpr {
        match &target.alias {
            Some(alias) => cut.strip_qualifier(alias),
            None => cut.clone(),
        }
    }

    /// Rows of the view's target in `fold` that pass `cut`.
    ///
    /// Fails with [`DatasetError::EmptyChain`] if the view has no rows and with
    /// [`DatasetError::EmptySelection`] if nothing passes.
    pub fn select(
        &self,
        view: &JoinedView<'_>,
        fold: u64,
        cut: &CompiledExpr,
        process: &str,
        target: &SourceDir,
    ) -> Result<Table> {
        let n_events = view.num_rows();
        if n_events == 0 {
            tracing::error!(
                process,
                source = target.label(),
                fold,
                "chain (before skimming) does not contain any events"
            );
            return Err(DatasetError::EmptyChain {
                process: process.to_string(),
                source_name: target.label().to_string(),
                fold,
            });
        }
        tracing::debug!(process, source = target.label(), events = n_events, "found events");
        tracing::debug!(
            selection = %format!("({} % {} == {fold}) && ({cut})", self.event_branch, self.num_folds),
            "skim events"
        );

        let folds = view.column_mod(&self.event_branch, self.num_folds)?;
        let passes_cut = view.mask(cut)?;
        let mask: Vec<bool> =
            folds.iter().zip(&passes_cut).map(|(&f, &pass)| pass && f == fold).collect();

        let selected = view.target().filter(&mask)?;
        if selected.num_rows() == 0 {
            tracing::error!(
                process,
                source = target.label(),
                fold,
                "chain (after skimming) does not contain any events"
            );
            return Err(DatasetError::EmptySelection {
                process: process.to_string(),
                source_name: target.label().to_string(),
                fold,
                selection: cut.source().to_string(),
            });
        }
        tracing::debug!(
            process,
            source = target.label(),
            events = selected.num_rows(),
            "found events after skimming"
        );
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, AsArray, Float64Array, Int64Array, UInt64Array};
    use arrow::datatypes::UInt64Type;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn base_source() -> SourceDir {
        SourceDir { index: 0, alias: None, dir: PathBuf::from("base") }
    }

    fn ten_events() -> Table {
        // Events 1..=10; pt > 20 for events 2, 3, 5, 6, 8, 9.
        let pt = vec![10.0, 25.0, 30.0, 5.0, 40.0, 50.0, 15.0, 21.0, 22.0, 1.0];
        Table::from_columns(
            "ntuple",
            vec![
                ("event".to_string(), Arc::new(Int64Array::from_iter_values(1..=10)) as ArrayRef),
                ("pt".to_string(), Arc::new(Float64Array::from(pt))),
            ],
        )
        .unwrap()
    }

    #[test]
    fn zero_folds_are_rejected() {
        assert!(matches!(FoldSelector::new("event", 0), Err(DatasetError::Config(_))));
        assert_eq!(FoldSelector::new("event", 3).unwrap().num_folds(), 3);
    }

    #[test]
    fn negative_events_wrap_into_folds() {
        let t = Table::from_columns(
            "ntuple",
            vec![("event".to_string(), Arc::new(Int64Array::from_iter_values(-3..4)) as ArrayRef)],
        )
        .unwrap();
        let view = JoinedView::new(&t);
        let cut = CompiledExpr::compile("1").unwrap();
        let sel = FoldSelector::new("event", 2).unwrap();
        let f1 = sel.select(&view, 1, &cut, "p", &base_source()).unwrap();
        assert_eq!(f1.column_i64("event").unwrap(), vec![-3, -1, 1, 3]);
    }

    #[test]
    fn unsigned_events_above_i64_range_keep_their_fold() {
        // u64::MAX and 2^63 + 1 are odd; 2^63 is even.
        let events = vec![u64::MAX, (1u64 << 63) + 1, 1u64 << 63, 4];
        let t = Table::from_columns(
            "ntuple",
            vec![("event".to_string(), Arc::new(UInt64Array::from(events)) as ArrayRef)],
        )
        .unwrap();
        let view = JoinedView::new(&t);
        let cut = CompiledExpr::compile("1").unwrap();
        let sel = FoldSelector::new("event", 2).unwrap();

        let f0 = sel.select(&view, 0, &cut, "p", &base_source()).unwrap();
        let f1 = sel.select(&view, 1, &cut, "p", &base_source()).unwrap();
        assert_eq!(f0.num_rows(), 2);
        assert_eq!(f1.num_rows(), 2);
        let odd = f1.column("event").unwrap().as_primitive::<UInt64Type>().values().to_vec();
        assert_eq!(odd, vec![u64::MAX, (1u64 << 63) + 1]);
    }

    #[test]
    fn six_passing_events_split_three_three() {
        let t = ten_events();
        let view = JoinedView::new(&t);
        let cut = CompiledExpr::compile("pt>20").unwrap();
        let sel = FoldSelector::new("event", 2).unwrap();

        let f0 = sel.select(&view, 0, &cut, "ggh", &base_source()).unwrap();
        let f1 = sel.select(&view, 1, &cut, "ggh", &base_source()).unwrap();
        assert_eq!(f0.num_rows(), 3);
        assert_eq!(f1.num_rows(), 3);
        assert_eq!(f0.column_i64("event").unwrap(), vec![2, 6, 8]);
        assert_eq!(f1.column_i64("event").unwrap(), vec![3, 5, 9]);
    }

    #[test]
    fn folds_cover_all_events_without_cut() {
        let t = ten_events();
        let view = JoinedView::new(&t);
        let cut = CompiledExpr::compile("1").unwrap();
        let sel = FoldSelector::new("event", 2).unwrap();
        let n0 = sel.select(&view, 0, &cut, "p", &base_source()).unwrap().num_rows();
        let n1 = sel.select(&view, 1, &cut, "p", &base_source()).unwrap().num_rows();
        assert_eq!(n0 + n1, t.num_rows());
    }

    #[test]
    fn nothing_selected_is_fatal() {
        let t = ten_events();
        let view = JoinedView::new(&t);
        let cut = CompiledExpr::compile("pt > 1000").unwrap();
        let err = FoldSelector::new("event", 2).unwrap().select(&view, 0, &cut, "ggh", &base_source());
        assert!(matches!(err, Err(DatasetError::EmptySelection { fold: 0, .. })));
    }

    #[test]
    fn empty_chain_is_fatal() {
        let t = ten_events().filter(&[false; 10]).unwrap();
        let view = JoinedView::new(&t);
        let cut = CompiledExpr::compile("1").unwrap();
        let err = FoldSelector::new("event", 2).unwrap().select(&view, 1, &cut, "ggh", &base_source());
        assert!(matches!(err, Err(DatasetError::EmptyChain { fold: 1, .. })));
    }

    #[test]
    fn event_branch_must_be_integer() {
        let t = ten_events();
        let view = JoinedView::new(&t);
        let cut = CompiledExpr::compile("1").unwrap();
        let err = FoldSelector::new("pt", 2).unwrap().select(&view, 0, &cut, "ggh", &base_source());
        assert!(matches!(err, Err(DatasetError::Table(_))));
    }

    #[test]
    fn friend_target_strips_own_alias() {
        let cut = CompiledExpr::compile("nn.score > 0.5 && pt > 3").unwrap();
        let friend = SourceDir { index: 1, alias: Some("nn".into()), dir: PathBuf::from("nn") };
        let stripped = FoldSelector::cut_for_target(&cut, &friend);
        assert_eq!(stripped.required_branches, vec!["score", "pt"]);
        let same = FoldSelector::cut_for_target(&cut, &base_source());
        assert_eq!(same.required_branches, vec!["nn.score", "pt"]);
    }
}
