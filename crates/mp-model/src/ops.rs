//! Dense-layer arithmetic on row-major batches.

use nalgebra::{DMatrix, DVector};

use crate::preset::Activation;

/// `x · kernel + bias`, with `bias` broadcast over rows.
pub(crate) fn affine(x: &DMatrix<f64>, kernel: &DMatrix<f64>, bias: &DVector<f64>) -> DMatrix<f64> {
    let mut y = x * kernel;
    for mut row in y.row_iter_mut() {
        for (v, b) in row.iter_mut().zip(bias.iter()) {
            *v += b;
        }
    }
    y
}

/// Apply `activation` in place. Softmax is taken per row.
pub(crate) fn activate(x: &mut DMatrix<f64>, activation: Activation) {
    match activation {
        Activation::Relu => x.apply(|v| *v = v.max(0.0)),
        Activation::Tanh => x.apply(|v| *v = v.tanh()),
        Activation::Softmax => {
            for mut row in x.row_iter_mut() {
                let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mut sum = 0.0;
                for v in row.iter_mut() {
                    *v = (*v - max).exp();
                    sum += *v;
                }
                for v in row.iter_mut() {
                    *v /= sum;
                }
            }
        }
    }
}
