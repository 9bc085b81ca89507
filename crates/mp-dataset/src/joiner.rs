//! Per-process source chains and the joined views built from them.

use mp_table::{Chain, EventStore, JoinedView, Table};

use crate::config::{DatasetConfig, ProcessPlan, SourceDir};
use crate::error::Result;

/// Build one chain per source directory for `process`.
///
/// Files are added in the order the process lists them.
pub fn process_chains(config: &DatasetConfig, process: &ProcessPlan) -> Vec<(SourceDir, Chain)> {
    config
        .sources()
        .into_iter()
        .map(|source| {
            let mut chain = Chain::new(config.tree_path.clone());
            for file in &process.files {
                chain.add_file(source.dir.join(file));
            }
            (source, chain)
        })
        .collect()
}

/// Loaded tables of every source of one process.
///
/// Immutable once opened; [`SourceSet::view`] builds a fresh
/// [`JoinedView`] for each target.
#[derive(Debug)]
pub struct SourceSet {
    sources: Vec<(SourceDir, Table)>,
}

impl SourceSet {
    /// Load the chains of `process` from every source directory.
    pub fn open(
        config: &DatasetConfig,
        process: &ProcessPlan,
        store: &dyn EventStore,
    ) -> Result<Self> {
        let mut sources = Vec::new();
        for (source, chain) in process_chains(config, process) {
            let table = chain.load(store)?;
            tracing::debug!(
                process = %process.name,
                source = source.label(),
                files = chain.files().len(),
                events = table.num_rows(),
                "loaded chain"
            );
            sources.push((source, table));
        }
        Ok(Self { sources })
    }

    /// Number of sources (base plus friends).
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no sources are loaded.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Source description at `index`.
    pub fn source(&self, index: usize) -> &SourceDir {
        &self.sources[index].0
    }

    /// Loaded table at `index`.
    pub fn table(&self, index: usize) -> &Table {
        &self.sources[index].1
    }

    /// View with source `target` as the target and every other source as friend.
    ///
    /// The base joins without an alias; friends join under their alias.
    pub fn view(&self, target: usize) -> Result<JoinedView<'_>> {
        let mut view = JoinedView::new(&self.sources[target].1);
        for (j, (source, table)) in self.sources.iter().enumerate() {
            if j != target {
                view = view.with_friend(source.alias.as_deref(), table)?;
            }
        }
        Ok(view)
    }
}
