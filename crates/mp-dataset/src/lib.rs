//! # mp-dataset
//!
//! Training dataset assembly for mvaprep.
//!
//! For each fold and each configured process the primary source and its
//! friend sources are chained, joined positionally, skimmed with
//! `event % 2 == fold && cut`, written per (process, source, fold) and
//! finally merged across processes per (source, fold). The primary source
//! additionally receives a per-event training weight column.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fold;
pub mod joiner;
pub mod merge;
pub mod pipeline;
pub mod weight;
pub mod writer;

pub use config::{DatasetConfig, DatasetPlan, FOLD_COUNT, ProcessPlan, ProcessSpec, SourceDir};
pub use error::{DatasetError, Result};
pub use fold::FoldSelector;
pub use joiner::{SourceSet, process_chains};
pub use merge::{CLASS_COLUMN, CommandMerge, MERGED_TABLE, MergeTool, MergedOutput, NativeMerge};
pub use pipeline::{BuildReport, DatasetBuilder};
pub use weight::{WEIGHT_SENTINEL, inject_training_weight};
pub use writer::{OutputUnit, unit_path, write_unit};
