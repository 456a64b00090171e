use std::error::Error;
use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Shape errors raised by the dense primitives
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeError(pub String);

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Shape mismatch: {}", self.0)
    }
}

impl Error for ShapeError {}

/// Nonlinearity applied after a dense layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Identity,
    Relu,
    Gelu,
    GeluTanh,
    Tanh,
}

impl Activation {
    pub fn apply(&self, x: &mut Array2<f32>) {
        match self {
            Activation::Identity => {}
            Activation::Relu => x.mapv_inplace(relu),
            Activation::Gelu => x.mapv_inplace(gelu),
            Activation::GeluTanh => x.mapv_inplace(gelu_tanh),
            Activation::Tanh => x.mapv_inplace(f32::tanh),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "identity" | "linear" => Some(Activation::Identity),
            "relu" => Some(Activation::Relu),
            "gelu" => Some(Activation::Gelu),
            "gelu_new" | "gelu_pytorch_tanh" => Some(Activation::GeluTanh),
            "tanh" => Some(Activation::Tanh),
            _ => None,
        }
    }
}

/// y = x · Wᵀ + b, with `weight` stored as [out, in]
pub fn linear(
    x: ArrayView2<f32>,
    weight: ArrayView2<f32>,
    bias: Option<ArrayView1<f32>>,
) -> Result<Array2<f32>, ShapeError> {
    if x.ncols() != weight.ncols() {
        return Err(ShapeError(format!(
            "input has {} features, weight expects {}", x.ncols(), weight.ncols()
        )));
    }
    let mut y = x.dot(&weight.t());
    if let Some(b) = bias {
        if b.len() != weight.nrows() {
            return Err(ShapeError(format!(
                "bias has {} entries, weight produces {}", b.len(), weight.nrows()
            )));
        }
        y += &b;
    }
    Ok(y)
}

/// Normalizes every row to zero mean and unit variance, then scales and shifts
pub fn layer_norm(
    x: &mut Array2<f32>,
    gamma: ArrayView1<f32>,
    beta: ArrayView1<f32>,
    eps: f32,
) -> Result<(), ShapeError> {
    let width = x.ncols();
    if gamma.len() != width || beta.len() != width {
        return Err(ShapeError(format!(
            "layer norm over {} features with gamma {} and beta {}", width, gamma.len(), beta.len()
        )));
    }
    for mut row in x.axis_iter_mut(Axis(0)) {
        let mean = row.sum() / width as f32;
        let var = row.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / width as f32;
        let inv_std = 1.0 / (var + eps).sqrt();
        for ((v, g), b) in row.iter_mut().zip(gamma.iter()).zip(beta.iter()) {
            *v = (*v - mean) * inv_std * g + b;
        }
    }
    Ok(())
}

/// Row-wise softmax, stable against large logits
pub fn softmax_rows(x: &mut Array2<f32>) {
    for mut row in x.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
}

/// Scales every row to unit L2 norm; all-zero rows stay zero
pub fn l2_normalize(x: &mut Array2<f32>) {
    for mut row in x.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
}

/// Mean of the rows whose mask entry is non-zero
pub fn masked_mean(x: ArrayView2<f32>, mask: &[u32]) -> Array1<f32> {
    let mut sum = Array1::<f32>::zeros(x.ncols());
    let mut count = 0usize;
    for (row, &m) in x.axis_iter(Axis(0)).zip(mask.iter()) {
        if m != 0 {
            sum += &row;
            count += 1;
        }
    }
    if count > 0 {
        sum /= count as f32;
    }
    sum
}

pub fn relu(x: f32) -> f32 {
    x.max(0.0)
}

/// Exact GELU: x · Φ(x)
pub fn gelu(x: f32) -> f32 {
    0.5 * x * (1.0 + erf(x / std::f32::consts::SQRT_2))
}

/// Tanh approximation of GELU
pub fn gelu_tanh(x: f32) -> f32 {
    const SQRT_2_OVER_PI: f32 = 0.797_884_6;
    0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044_715 * x * x * x)).tanh())
}

/// Error function, Abramowitz and Stegun 7.1.26 (max error 1.5e-7)
pub fn erf(x: f32) -> f32 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() as f64;
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t * (0.254_829_592
        + t * (-0.284_496_736
        + t * (1.421_413_741
        + t * (-1.453_152_027
        + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp()) as f32
}
