//! # mp-table
//!
//! Tabular event store for mvaprep.
//!
//! Event tables live in Parquet files, one table per file. Several files
//! form a [`Chain`]; chains of auxiliary ("friend") sources are joined
//! positionally onto a target through a [`JoinedView`], and selections and
//! weights are string expressions compiled once into a [`CompiledExpr`].
//!
//! ## Example
//!
//! ```no_run
//! use mp_table::{Chain, CompiledExpr, JoinedView, ParquetStore};
//!
//! let store = ParquetStore::default();
//! let mut base = Chain::new("ntuple");
//! base.add_file("ntuples/ggH.parquet");
//! let mut nn = Chain::new("ntuple");
//! nn.add_file("friends/nn/ggH.parquet");
//!
//! let base = base.load(&store).unwrap();
//! let nn = nn.load(&store).unwrap();
//! let view = JoinedView::new(&base).with_friend(Some("nn"), &nn).unwrap();
//! let cut = CompiledExpr::compile("pt_1 > 20 && nn.score > 0.5").unwrap();
//! let selected = base.filter(&view.mask(&cut).unwrap()).unwrap();
//! println!("{} of {} events pass", selected.num_rows(), base.num_rows());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod error;
pub mod expr;
pub mod store;
pub mod table;
pub mod view;

pub use chain::Chain;
pub use error::{Result, TableError};
pub use expr::{CompiledExpr, is_selected};
pub use store::{EventStore, ParquetStore};
pub use table::{META_KEY_TABLE, Table};
pub use view::JoinedView;
