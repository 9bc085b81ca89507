//! # mp-model
//!
//! Classifier definitions for training on mvaprep datasets.
//!
//! Architectures are named [`Preset`]s mapped onto one parametric builder,
//! [`build`]. A [`CompiledModel`] can run an inference-mode forward pass from
//! a [`Weights`] set; exportable presets also yield a standalone
//! [`InferenceGraph`].
//!
//! ```
//! use mp_model::{InferenceGraph, build};
//! use nalgebra::DMatrix;
//!
//! let model = build("smhtt_dropout_tanh", 4, 3).unwrap();
//! let weights = model.init_weights(42);
//! let graph = InferenceGraph::from_trained(&model, &weights).unwrap();
//! let probs = graph.forward(&DMatrix::zeros(2, 4)).unwrap();
//! assert_eq!(probs.shape(), (2, 3));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod error;
pub mod graph;
mod ops;
pub mod preset;
pub mod weights;

pub use builder::{CompiledModel, Layer, build};
pub use error::{ModelError, Result};
pub use graph::InferenceGraph;
pub use preset::{
    Activation, Initializer, Loss, Metric, Optimizer, PRESETS, Preset, preset, preset_names,
};
pub use weights::{Tensor, Weights, bias_name, kernel_name};
