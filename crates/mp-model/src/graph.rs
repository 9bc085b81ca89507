//! Standalone inference graphs for deployment.
//!
//! An [`InferenceGraph`] holds only dense kernels, biases and the activation
//! sequence of a trained model, so it can be evaluated without the model
//! definition that produced the weights.

use nalgebra::{DMatrix, DVector};

use crate::builder::CompiledModel;
use crate::error::{ModelError, Result};
use crate::ops::{activate, affine};
use crate::preset::Activation;
use crate::weights::{Weights, bias_name, kernel_name};

#[derive(Debug, Clone)]
struct GraphLayer {
    kernel: DMatrix<f64>,
    bias: DVector<f64>,
    activation: Activation,
}

/// Forward pass `softmax(act(act(x·W1 + b1)·W2 + b2)·W3 + b3)` and its
/// generalisation to any number of hidden layers.
#[derive(Debug, Clone)]
pub struct InferenceGraph {
    layers: Vec<GraphLayer>,
}

impl InferenceGraph {
    /// Rebuild the forward pass of `model` from its trained weights.
    ///
    /// Only presets marked exportable provide a graph. Tensors are read as
    /// `dense_<n>/kernel` and `dense_<n>/bias` (1-indexed) and must match the
    /// layer widths of `model`.
    pub fn from_trained(model: &CompiledModel, weights: &Weights) -> Result<Self> {
        let preset = model.preset();
        if !preset.exportable {
            return Err(ModelError::NotExportable(preset.name.to_string()));
        }
        let shapes = model.dense_shapes();
        let last = shapes.len();
        let mut layers = Vec::with_capacity(last);
        for (i, &(inputs, units)) in shapes.iter().enumerate() {
            let n = i + 1;
            let k = weights.require(&kernel_name(n), &[inputs, units])?;
            let b = weights.require(&bias_name(n), &[units])?;
            tracing::debug!(layer = n, inputs, units, "load dense layer");
            layers.push(GraphLayer {
                kernel: DMatrix::from_row_slice(inputs, units, &k.data),
                bias: DVector::from_column_slice(&b.data),
                activation: if n == last { Activation::Softmax } else { preset.activation },
            });
        }
        Ok(Self { layers })
    }

    /// Number of dense layers.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Layer widths, input first.
    pub fn widths(&self) -> Vec<usize> {
        let mut w: Vec<usize> = self.layers.first().map(|l| l.kernel.nrows()).into_iter().collect();
        w.extend(self.layers.iter().map(|l| l.kernel.ncols()));
        w
    }

    /// Activation of each layer.
    pub fn activations(&self) -> Vec<Activation> {
        self.layers.iter().map(|l| l.activation).collect()
    }

    /// Evaluate on a `rows × inputs` batch.
    pub fn forward(&self, input: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let expected = self.layers.first().map_or(0, |l| l.kernel.nrows());
        if input.ncols() != expected {
            return Err(ModelError::InputWidth { expected, actual: input.ncols() });
        }
        let mut x = input.clone();
        for l in &self.layers {
            x = affine(&x, &l.kernel, &l.bias);
            activate(&mut x, l.activation);
        }
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::weights::Tensor;

    #[test]
    fn only_exportable_presets() {
        let m = build("smhtt_mt", 3, 2).unwrap();
        let err = InferenceGraph::from_trained(&m, &m.init_weights(0)).unwrap_err();
        assert!(matches!(err, ModelError::NotExportable(name) if name == "smhtt_mt"));
    }

    #[test]
    fn structure_matches_model() {
        let m = build("smhtt_dropout", 5, 3).unwrap();
        let g = InferenceGraph::from_trained(&m, &m.init_weights(3)).unwrap();
        assert_eq!(g.depth(), 3);
        assert_eq!(g.widths(), vec![5, 200, 200, 3]);
        assert_eq!(g.activations(), vec![Activation::Relu, Activation::Relu, Activation::Softmax]);
    }

    #[test]
    fn missing_and_misshapen_tensors() {
        let m = build("smhtt_dropout_tanh", 2, 2).unwrap();
        let mut w = m.init_weights(0);
        w.insert("dense_2/bias", Tensor::new(vec![3], vec![0.0; 3])).unwrap();
        assert!(matches!(
            InferenceGraph::from_trained(&m, &w),
            Err(ModelError::WeightShape { name, .. }) if name == "dense_2/bias"
        ));
        assert!(matches!(
            InferenceGraph::from_trained(&m, &Weights::new()),
            Err(ModelError::MissingWeight(name)) if name == "dense_1/kernel"
        ));
    }
}
