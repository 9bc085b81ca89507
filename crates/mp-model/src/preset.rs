//! Named classifier presets.
//!
//! Every preset is a fully connected network with a softmax output layer.
//! Two layer styles exist: dense layers with a fused activation, or a bare
//! dense layer followed by separate activation and dropout layers.

use std::fmt;

use crate::error::{ModelError, Result};

/// Nonlinearity applied after a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// `max(0, x)`
    Relu,
    /// Hyperbolic tangent.
    Tanh,
    /// Row-wise softmax.
    Softmax,
}

impl Activation {
    /// Keras-style identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relu => "relu",
            Self::Tanh => "tanh",
            Self::Softmax => "softmax",
        }
    }
}

/// Kernel initializer (biases start at zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initializer {
    /// Truncated normal with stddev `sqrt(2 / (fan_in + fan_out))`.
    GlorotNormal,
    /// Uniform in `±sqrt(6 / (fan_in + fan_out))`.
    GlorotUniform,
}

/// Training loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    /// Categorical cross-entropy.
    CategoricalCrossentropy,
    /// Mean squared error.
    MeanSquaredError,
}

/// Optimizer with its learning rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Optimizer {
    /// Adam.
    Adam {
        /// Learning rate.
        learning_rate: f64,
    },
    /// Nesterov Adam.
    Nadam {
        /// Learning rate.
        learning_rate: f64,
    },
}

/// Default Adam learning rate.
pub const ADAM_DEFAULT_LR: f64 = 1e-3;
/// Default Nadam learning rate.
pub const NADAM_DEFAULT_LR: f64 = 2e-3;

impl Optimizer {
    /// Learning rate.
    pub fn learning_rate(&self) -> f64 {
        match *self {
            Self::Adam { learning_rate } | Self::Nadam { learning_rate } => learning_rate,
        }
    }
}

/// Metric tracked during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Categorical accuracy.
    CategoricalAccuracy,
    /// Mean squared error.
    MeanSquaredError,
}

/// Hyperparameters of one named architecture.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    /// Registry name.
    pub name: &'static str,
    /// Hidden layer widths.
    pub hidden: &'static [usize],
    /// Hidden layer activation.
    pub activation: Activation,
    /// Hidden kernel initializer.
    pub initializer: Initializer,
    /// Output kernel initializer.
    pub output_initializer: Initializer,
    /// L2 strength on hidden kernels.
    pub l2: Option<f64>,
    /// L2 strength on the output kernel.
    pub output_l2: Option<f64>,
    /// Dropout rate after each hidden activation. Presets with dropout use
    /// separate activation layers.
    pub dropout: Option<f64>,
    /// Loss.
    pub loss: Loss,
    /// Optimizer.
    pub optimizer: Optimizer,
    /// Metrics.
    pub metrics: &'static [Metric],
    /// Sample-weighted metrics.
    pub weighted_metrics: &'static [Metric],
    /// Whether an [`InferenceGraph`](crate::InferenceGraph) can be exported.
    pub exportable: bool,
}

impl Preset {
    /// Whether activations are separate layers.
    pub fn separate_activations(&self) -> bool {
        self.dropout.is_some()
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.name)?;
        for (i, w) in self.hidden.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{w}")?;
        }
        write!(f, " {}", self.activation.as_str())?;
        if let Some(rate) = self.dropout {
            write!(f, ", dropout {rate}")?;
        }
        write!(f, ")")
    }
}

const FUSED: Preset = Preset {
    name: "",
    hidden: &[],
    activation: Activation::Tanh,
    initializer: Initializer::GlorotNormal,
    output_initializer: Initializer::GlorotNormal,
    l2: None,
    output_l2: None,
    dropout: None,
    loss: Loss::MeanSquaredError,
    optimizer: Optimizer::Nadam { learning_rate: NADAM_DEFAULT_LR },
    metrics: &[],
    weighted_metrics: &[],
    exportable: false,
};

/// All presets, in registry order.
pub static PRESETS: &[Preset] = &[
    Preset {
        name: "example",
        hidden: &[10],
        activation: Activation::Relu,
        output_initializer: Initializer::GlorotUniform,
        loss: Loss::CategoricalCrossentropy,
        optimizer: Optimizer::Adam { learning_rate: ADAM_DEFAULT_LR },
        metrics: &[Metric::CategoricalAccuracy],
        ..FUSED
    },
    Preset { name: "smhtt_simple", hidden: &[100], ..FUSED },
    Preset { name: "smhtt_mt", hidden: &[300, 300, 300], l2: Some(1e-4), ..FUSED },
    Preset { name: "smhtt_et", hidden: &[1000], l2: Some(1e-4), ..FUSED },
    Preset { name: "smhtt_tt", hidden: &[200, 200, 200], l2: Some(1e-4), ..FUSED },
    Preset {
        name: "smhtt_legacy",
        hidden: &[300, 300, 300],
        activation: Activation::Relu,
        l2: Some(1e-4),
        optimizer: Optimizer::Adam { learning_rate: ADAM_DEFAULT_LR },
        ..FUSED
    },
    Preset {
        name: "smhtt_dropout",
        hidden: &[200, 200],
        activation: Activation::Relu,
        initializer: Initializer::GlorotUniform,
        output_initializer: Initializer::GlorotUniform,
        dropout: Some(0.5),
        exportable: true,
        ..FUSED
    },
    Preset {
        name: "smhtt_dropout_tanh",
        hidden: &[200, 200],
        initializer: Initializer::GlorotUniform,
        output_initializer: Initializer::GlorotUniform,
        l2: Some(1e-5),
        output_l2: Some(1e-5),
        dropout: Some(0.3),
        loss: Loss::CategoricalCrossentropy,
        optimizer: Optimizer::Adam { learning_rate: 1e-4 },
        weighted_metrics: &[Metric::MeanSquaredError],
        exportable: true,
        ..FUSED
    },
];

/// Look up a preset by name.
pub fn preset(name: &str) -> Result<&'static Preset> {
    PRESETS.iter().find(|p| p.name == name).ok_or_else(|| ModelError::UnknownPreset(name.into()))
}

/// Names of all presets.
pub fn preset_names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|p| p.name)
}
