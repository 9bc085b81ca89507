//! Trained weight sets.
//!
//! On disk a weight set is a JSON object mapping tensor names to
//! `{"shape": [...], "data": [...]}` with row-major data. Dense layers are
//! named `dense_<n>/kernel` and `dense_<n>/bias`, 1-indexed; names carrying
//! a `:0` output suffix resolve as well.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A dense tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Dimensions.
    pub shape: Vec<usize>,
    /// Row-major values.
    pub data: Vec<f64>,
}

impl Tensor {
    /// Tensor from a shape and row-major data. Lengths are checked on insert.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Self {
        Self { shape, data }
    }

    fn check(&self, name: &str) -> Result<()> {
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(ModelError::TensorLength {
                name: name.to_string(),
                shape: self.shape.clone(),
                expected,
                len: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Kernel tensor name of dense layer `n` (1-indexed).
pub fn kernel_name(n: usize) -> String {
    format!("dense_{n}/kernel")
}

/// Bias tensor name of dense layer `n` (1-indexed).
pub fn bias_name(n: usize) -> String {
    format!("dense_{n}/bias")
}

/// Named tensors of a trained model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights {
    tensors: BTreeMap<String, Tensor>,
}

impl Weights {
    /// Empty weight set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON weight set.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let weights: Self = serde_json::from_str(json)?;
        for (name, t) in &weights.tensors {
            t.check(name)?;
        }
        Ok(weights)
    }

    /// Read a JSON weight file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ModelError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&text)
    }

    /// Serialize to JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write a JSON weight file, replacing any existing one.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json_string()?;
        std::fs::write(path, json)
            .map_err(|source| ModelError::Io { path: path.to_path_buf(), source })
    }

    /// Add or replace a tensor.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Result<()> {
        let name = name.into();
        tensor.check(&name)?;
        self.tensors.insert(name, tensor);
        Ok(())
    }

    /// Add or replace a tensor of `shape` whose values come from `fill`,
    /// drawn in row-major order.
    pub(crate) fn insert_filled(
        &mut self,
        name: String,
        shape: Vec<usize>,
        fill: impl FnMut() -> f64,
    ) {
        let len = shape.iter().product();
        let data = std::iter::repeat_with(fill).take(len).collect();
        self.tensors.insert(name, Tensor { shape, data });
    }

    /// Tensor by name; `name:0` is found under `name` and vice versa.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        if let Some(t) = self.tensors.get(name) {
            return Some(t);
        }
        match name.strip_suffix(":0") {
            Some(bare) => self.tensors.get(bare),
            None => self.tensors.get(&format!("{name}:0")),
        }
    }

    /// Tensor `name` with exactly `shape`.
    pub fn require(&self, name: &str, shape: &[usize]) -> Result<&Tensor> {
        let t = self.get(name).ok_or_else(|| ModelError::MissingWeight(name.to_string()))?;
        if t.shape != shape {
            return Err(ModelError::WeightShape {
                name: name.to_string(),
                expected: shape.to_vec(),
                actual: t.shape.clone(),
            });
        }
        Ok(t)
    }

    /// Tensor names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_suffix_is_optional() {
        let mut w = Weights::new();
        w.insert("dense_1/kernel:0", Tensor::new(vec![2, 1], vec![1.0, 2.0])).unwrap();
        w.insert("dense_1/bias", Tensor::new(vec![1], vec![0.5])).unwrap();
        assert!(w.get(&kernel_name(1)).is_some());
        assert!(w.get("dense_1/bias:0").is_some());
        assert!(w.get("dense_2/bias").is_none());
    }

    #[test]
    fn json_layout() {
        let w = Weights::from_json_str(r#"{"dense_1/bias": {"shape": [2], "data": [0.0, 1.0]}}"#)
            .unwrap();
        assert_eq!(w.len(), 1);
        assert_eq!(w.require(&bias_name(1), &[2]).unwrap().data, vec![0.0, 1.0]);

        let err = Weights::from_json_str(r#"{"x": {"shape": [2, 2], "data": [1.0]}}"#).unwrap_err();
        assert!(matches!(err, ModelError::TensorLength { expected: 4, len: 1, .. }));
    }

    #[test]
    fn require_checks_shape() {
        let mut w = Weights::new();
        w.insert("dense_1/bias", Tensor::new(vec![3], vec![0.0; 3])).unwrap();
        assert!(matches!(w.require("dense_1/bias", &[2]), Err(ModelError::WeightShape { .. })));
        assert!(matches!(w.require("dense_1/kernel", &[2]), Err(ModelError::MissingWeight(_))));
    }
}
