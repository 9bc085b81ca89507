//! Parametric model builder.

use std::fmt::Write as _;

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::error::{ModelError, Result};
use crate::ops::{activate, affine};
use crate::preset::{Activation, Initializer, Loss, Metric, Optimizer, Preset, preset};
use crate::weights::{Weights, bias_name, kernel_name};

/// One layer of a sequential model.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// Fully connected layer, optionally with a fused activation.
    Dense {
        /// Input width.
        inputs: usize,
        /// Output width.
        units: usize,
        /// Fused activation.
        activation: Option<Activation>,
        /// Kernel initializer.
        initializer: Initializer,
        /// L2 strength on the kernel.
        l2: Option<f64>,
    },
    /// Standalone activation.
    Activation(Activation),
    /// Dropout with the given rate; identity at inference.
    Dropout(f64),
}

/// A sequential model ready to be fit.
#[derive(Debug, Clone)]
pub struct CompiledModel {
    preset: &'static Preset,
    num_inputs: usize,
    num_outputs: usize,
    layers: Vec<Layer>,
}

/// Build the preset `name` for `num_inputs` features and `num_outputs` classes.
pub fn build(name: &str, num_inputs: usize, num_outputs: usize) -> Result<CompiledModel> {
    CompiledModel::new(preset(name)?, num_inputs, num_outputs)
}

impl CompiledModel {
    /// Lay out `preset` for the given widths.
    pub fn new(preset: &'static Preset, num_inputs: usize, num_outputs: usize) -> Result<Self> {
        if num_inputs == 0 {
            return Err(ModelError::InvalidDimension { what: "num_inputs", value: num_inputs });
        }
        if num_outputs == 0 {
            return Err(ModelError::InvalidDimension { what: "num_outputs", value: num_outputs });
        }

        let separate = preset.separate_activations();
        let mut layers = Vec::new();
        let mut width = num_inputs;
        for &units in preset.hidden {
            layers.push(Layer::Dense {
                inputs: width,
                units,
                activation: (!separate).then_some(preset.activation),
                initializer: preset.initializer,
                l2: preset.l2,
            });
            if separate {
                layers.push(Layer::Activation(preset.activation));
            }
            if let Some(rate) = preset.dropout {
                layers.push(Layer::Dropout(rate));
            }
            width = units;
        }
        layers.push(Layer::Dense {
            inputs: width,
            units: num_outputs,
            activation: (!separate).then_some(Activation::Softmax),
            initializer: preset.output_initializer,
            l2: preset.output_l2,
        });
        if separate {
            layers.push(Layer::Activation(Activation::Softmax));
        }

        tracing::debug!(preset = preset.name, num_inputs, num_outputs, "built model");
        Ok(Self { preset, num_inputs, num_outputs, layers })
    }

    /// The preset this model was built from.
    pub fn preset(&self) -> &'static Preset {
        self.preset
    }

    /// Input width.
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Output width.
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Layers in order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Training loss.
    pub fn loss(&self) -> Loss {
        self.preset.loss
    }

    /// Optimizer.
    pub fn optimizer(&self) -> Optimizer {
        self.preset.optimizer
    }

    /// Metrics.
    pub fn metrics(&self) -> &'static [Metric] {
        self.preset.metrics
    }

    /// `(inputs, units)` of each dense layer; dense layer `n` is `dense_{n+1}`.
    pub fn dense_shapes(&self) -> Vec<(usize, usize)> {
        self.layers
            .iter()
            .filter_map(|l| match *l {
                Layer::Dense { inputs, units, .. } => Some((inputs, units)),
                _ => None,
            })
            .collect()
    }

    /// Number of trainable parameters.
    pub fn parameter_count(&self) -> usize {
        self.dense_shapes().iter().map(|(i, u)| i * u + u).sum()
    }

    /// Freshly initialized weights, reproducible for a given `seed`.
    pub fn init_weights(&self, seed: u64) -> Weights {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut weights = Weights::new();
        let mut n = 0;
        for layer in &self.layers {
            let Layer::Dense { inputs, units, initializer, .. } = *layer else { continue };
            n += 1;
            weights.insert_filled(kernel_name(n), vec![inputs, units], || {
                sample_init(&mut rng, initializer, inputs, units)
            });
            weights.insert_filled(bias_name(n), vec![units], || 0.0);
        }
        weights
    }

    /// `sum(l2 * ||kernel||²)` over regularized dense layers.
    pub fn l2_penalty(&self, weights: &Weights) -> Result<f64> {
        let mut total = 0.0;
        let mut n = 0;
        for layer in &self.layers {
            let Layer::Dense { inputs, units, l2, .. } = *layer else { continue };
            n += 1;
            if let Some(strength) = l2 {
                let k = weights.require(&kernel_name(n), &[inputs, units])?;
                total += strength * k.data.iter().map(|v| v * v).sum::<f64>();
            }
        }
        Ok(total)
    }

    /// Inference-mode forward pass over a batch of shape `rows × num_inputs`.
    ///
    /// Dropout layers pass values through unchanged.
    pub fn predict(&self, weights: &Weights, batch: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if batch.ncols() != self.num_inputs {
            return Err(ModelError::InputWidth {
                expected: self.num_inputs,
                actual: batch.ncols(),
            });
        }
        let mut x = batch.clone();
        let mut n = 0;
        for layer in &self.layers {
            match *layer {
                Layer::Dense { inputs, units, activation, .. } => {
                    n += 1;
                    let k = weights.require(&kernel_name(n), &[inputs, units])?;
                    let b = weights.require(&bias_name(n), &[units])?;
                    let kernel = DMatrix::from_row_slice(inputs, units, &k.data);
                    let bias = DVector::from_column_slice(&b.data);
                    x = affine(&x, &kernel, &bias);
                    if let Some(act) = activation {
                        activate(&mut x, act);
                    }
                }
                Layer::Activation(act) => activate(&mut x, act),
                Layer::Dropout(_) => {}
            }
        }
        Ok(x)
    }

    /// Keras-like text summary.
    pub fn summary(&self) -> String {
        let mut out = format!("model: {}\n", self.preset);
        let mut n = 0;
        for layer in &self.layers {
            let _ = match layer {
                Layer::Dense { units, activation, l2, .. } => {
                    n += 1;
                    let act = activation.map(|a| a.as_str()).unwrap_or("linear");
                    match l2 {
                        Some(s) => writeln!(out, "  dense_{n}: {units} {act}, l2 {s:e}"),
                        None => writeln!(out, "  dense_{n}: {units} {act}"),
                    }
                }
                Layer::Activation(a) => writeln!(out, "  activation: {}", a.as_str()),
                Layer::Dropout(r) => writeln!(out, "  dropout: {r}"),
            };
        }
        let _ = write!(out, "params: {}", self.parameter_count());
        out
    }
}

fn sample_init(rng: &mut StdRng, init: Initializer, fan_in: usize, fan_out: usize) -> f64 {
    let fans = (fan_in + fan_out) as f64;
    match init {
        Initializer::GlorotUniform => {
            let limit = (6.0 / fans).sqrt();
            rng.random_range(-limit..limit)
        }
        Initializer::GlorotNormal => {
            // Truncated at two standard deviations, rescaled to keep the variance.
            let stddev = (2.0 / fans).sqrt() / 0.879_625_661_034_239_8;
            loop {
                let z: f64 = rng.sample(StandardNormal);
                if z.abs() <= 2.0 {
                    return z * stddev;
                }
            }
        }
    }
}
