//! Error types for model presets and weights.

use std::path::PathBuf;

use thiserror::Error;

/// Model error type.
#[derive(Error, Debug)]
pub enum ModelError {
    /// I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No preset with this name.
    #[error("unknown model preset '{0}'")]
    UnknownPreset(String),

    /// Zero input or output width.
    #[error("{what} must be positive, got {value}")]
    InvalidDimension {
        /// `num_inputs` or `num_outputs`.
        what: &'static str,
        /// Given value.
        value: usize,
    },

    /// Preset has no exportable inference graph.
    #[error("preset '{0}' does not provide an inference graph")]
    NotExportable(String),

    /// Weight tensor missing from the weight set.
    #[error("missing weight tensor '{0}'")]
    MissingWeight(String),

    /// Tensor shape does not match the layer.
    #[error("weight tensor '{name}' has shape {actual:?}, expected {expected:?}")]
    WeightShape {
        /// Tensor name.
        name: String,
        /// Shape the layer needs.
        expected: Vec<usize>,
        /// Shape found.
        actual: Vec<usize>,
    },

    /// Tensor data length disagrees with its shape.
    #[error("weight tensor '{name}' holds {len} values, shape {shape:?} needs {expected}")]
    TensorLength {
        /// Tensor name.
        name: String,
        /// Declared shape.
        shape: Vec<usize>,
        /// Product of the shape.
        expected: usize,
        /// Data length.
        len: usize,
    },

    /// Input batch width does not match the model.
    #[error("input batch has {actual} columns, model expects {expected}")]
    InputWidth {
        /// Model input width.
        expected: usize,
        /// Batch width.
        actual: usize,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ModelError>;
