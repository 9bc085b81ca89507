//! DatasetBuilder: orchestrates chain loading, fold selection, weight
//! injection, unit writing and merging.

use std::path::PathBuf;

use mp_table::EventStore;

use crate::config::{DatasetPlan, FOLD_COUNT, ProcessPlan};
use crate::error::{DatasetError, Result};
use crate::fold::FoldSelector;
use crate::joiner::SourceSet;
use crate::merge::{CommandMerge, MergeTool, MergedOutput, NativeMerge, merged_path};
use crate::weight::inject_training_weight;
use crate::writer::{OutputUnit, unit_path, write_unit};

/// Files produced by one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Output units in creation order (fold, process, source).
    pub units: Vec<OutputUnit>,
    /// Merged outputs in creation order (fold, source).
    pub merged: Vec<MergedOutput>,
}

impl BuildReport {
    /// Units of one (source, fold), in process order.
    pub fn units_for(&self, source: usize, fold: u64) -> Vec<&OutputUnit> {
        self.units.iter().filter(|u| u.source == source && u.fold == fold).collect()
    }
}

/// Builds the fold-split training dataset described by a [`DatasetPlan`].
///
/// Processing is sequential: fold 0 before fold 1, processes in config
/// order, the base source before friends. Any error aborts the run.
///
/// # Example
///
/// ```no_run
/// use mp_dataset::{DatasetBuilder, DatasetPlan};
/// use mp_table::ParquetStore;
///
/// let plan = DatasetPlan::load("dataset.yaml".as_ref()).unwrap();
/// let store = ParquetStore::default();
/// let report = DatasetBuilder::new(&plan, &store).build().unwrap();
/// for m in &report.merged {
///     println!("{}", m.path.display());
/// }
/// ```
pub struct DatasetBuilder<'a> {
    plan: &'a DatasetPlan,
    store: &'a dyn EventStore,
    merger: Option<&'a dyn MergeTool>,
}

impl<'a> DatasetBuilder<'a> {
    /// Builder reading and writing tables through `store`.
    pub fn new(plan: &'a DatasetPlan, store: &'a dyn EventStore) -> Self {
        Self { plan, store, merger: None }
    }

    /// Use `merger` instead of the one the config selects.
    pub fn merger(mut self, merger: &'a dyn MergeTool) -> Self {
        self.merger = Some(merger);
        self
    }

    /// Run the whole pipeline.
    pub fn build(&self) -> Result<BuildReport> {
        let cfg = &self.plan.config;
        let span = tracing::info_span!("dataset_build", output = %cfg.output_path.display());
        let _enter = span.enter();

        cfg.check_source_files()?;
        std::fs::create_dir_all(&cfg.output_path)
            .map_err(|source| DatasetError::Io { path: cfg.output_path.clone(), source })?;

        let native = NativeMerge::new(self.store);
        let command = cfg.merge_command.as_deref().and_then(CommandMerge::from_argv);
        let merger: &dyn MergeTool = match (self.merger, &command) {
            (Some(m), _) => m,
            (None, Some(c)) => c,
            (None, None) => &native,
        };

        let selector = FoldSelector::new(cfg.event_branch.clone(), FOLD_COUNT)?;
        let sources = cfg.sources();
        let mut report = BuildReport::default();

        for fold in 0..FOLD_COUNT {
            tracing::info!(fold, "merge input files for fold");
            for process in &self.plan.processes {
                tracing::debug!(process = %process.name, fold, "collect events of process");
                let set = SourceSet::open(cfg, process, self.store)?;
                for target in 0..set.len() {
                    report.units.push(self.write_target(&set, target, process, fold, &selector)?);
                }
            }

            tracing::debug!(fold, "combine files of processes");
            for source in &sources {
                let units = report.units_for(source.index, fold);
                let rows: usize = units.iter().map(|u| u.rows).sum();
                let inputs: Vec<PathBuf> = units.into_iter().map(|u| u.path.clone()).collect();
                let output = merged_path(&cfg.output_path, source, fold, &cfg.output_filename);
                merger.merge(&output, &inputs)?;
                tracing::info!(
                    path = %output.display(),
                    inputs = inputs.len(),
                    rows,
                    "created output file"
                );
                report.merged.push(MergedOutput {
                    source: source.index,
                    fold,
                    path: output,
                    inputs,
                    rows,
                });
            }
        }
        Ok(report)
    }

    fn write_target(
        &self,
        set: &SourceSet,
        target: usize,
        process: &ProcessPlan,
        fold: u64,
        selector: &FoldSelector,
    ) -> Result<OutputUnit> {
        let cfg = &self.plan.config;
        let source = set.source(target);
        let cut = FoldSelector::cut_for_target(&process.cut, source);
        let selected = selector.select(&set.view(target)?, fold, &cut, &process.name, source)?;

        let table = if source.is_base() {
            inject_training_weight(&selected, &process.weight, &cfg.training_weight_branch)?
        } else {
            selected
        };

        let path = unit_path(&cfg.output_path, source, fold, &process.name);
        let rows = write_unit(self.store, &path, table, &process.class_name)?;
        Ok(OutputUnit { process: process.name.clone(), source: source.index, fold, path, rows })
    }
}
