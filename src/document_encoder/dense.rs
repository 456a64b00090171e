use ndarray::{Array1, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use super::types::DocumentEncoderError;

/// Samples beyond this many standard deviations are redrawn
const TRUNCATION: f32 = 2.0;
/// Standard deviation of a unit normal truncated to [-2, 2]
const TRUNCATED_STD: f32 = 0.879_625_7;

/// Fully connected layer with kernel stored as [in, out]
#[derive(Debug, Clone)]
pub struct Dense {
    pub kernel: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Dense {
    /// Lecun-normal kernel truncated at two standard deviations, zero bias.
    ///
    /// The scale is divided by the std of a unit normal cut at ±2 so the
    /// kernel's variance stays 1/fan_in.
    pub fn init(in_dim: usize, out_dim: usize, rng: &mut StdRng) -> Result<Self, DocumentEncoderError> {
        if in_dim == 0 {
            return Err(DocumentEncoderError::InvalidDimension("fan_in 0".to_string()));
        }
        let scale = (1.0 / in_dim as f32).sqrt() / TRUNCATED_STD;
        let normal = Normal::new(0.0f32, 1.0)
            .map_err(|e| DocumentEncoderError::InvalidDimension(format!("fan_in {}: {}", in_dim, e)))?;
        let kernel = Array2::from_shape_simple_fn((in_dim, out_dim), || {
            loop {
                let z = normal.sample(&mut *rng);
                if z.abs() <= TRUNCATION {
                    break z * scale;
                }
            }
        });
        Ok(Self { kernel, bias: Array1::zeros(out_dim) })
    }

    pub fn in_dim(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn out_dim(&self) -> usize {
        self.kernel.ncols()
    }

    pub fn parameter_count(&self) -> usize {
        self.kernel.len() + self.bias.len()
    }

    pub fn apply(&self, x: ArrayView2<f32>) -> Result<Array2<f32>, DocumentEncoderError> {
        if x.ncols() != self.in_dim() {
            return Err(DocumentEncoderError::ShapeMismatch {
                expected: self.in_dim(),
                actual: x.ncols(),
            });
        }
        let mut y = x.dot(&self.kernel);
        y += &self.bias;
        Ok(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_init_is_truncated_lecun_normal() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = Dense::init(256, 256, &mut rng).unwrap();
        let scale = (1.0f32 / 256.0).sqrt() / TRUNCATED_STD;

        assert!(layer.kernel.iter().all(|w| w.abs() <= TRUNCATION * scale));
        assert!(layer.bias.iter().all(|&b| b == 0.0));

        let n = layer.kernel.len() as f32;
        let mean = layer.kernel.sum() / n;
        let std = (layer.kernel.mapv(|w| (w - mean).powi(2)).sum() / n).sqrt();
        assert!(mean.abs() < 0.002, "mean {}", mean);
        assert!((std - 1.0 / 16.0).abs() < 0.003, "std {}", std);
    }

    #[test]
    fn test_init_rejects_zero_fan_in() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Dense::init(0, 4, &mut rng).is_err());
    }
}
