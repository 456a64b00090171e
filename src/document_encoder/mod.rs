//! Projection head that maps encoder states into a document embedding space.
//!
//! The head is a stack of dense layers whose output widths are given by
//! `dimensions`. Construction is free; parameters appear only once `setup`
//! knows the input width, so any `dimensions` value can be held before the
//! encoder it sits on is known.

mod dense;
mod types;

pub use dense::Dense;
pub use types::DocumentEncoderError;

use std::path::Path;

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::nn::Activation;
use crate::safetensors::{SafeTensorsReader, SafeTensorsWriter};

const META_DIMENSIONS: &str = "dimensions";
const META_INPUT_DIM: &str = "input_dim";
const META_ACTIVATION: &str = "activation";

/// One encoder for a document
#[derive(Debug, Clone)]
pub struct DocumentEncoder {
    /// Output width of each dense layer, in order
    pub dimensions: Vec<usize>,
    /// Applied between layers, never after the last
    activation: Activation,
    input_dim: Option<usize>,
    layers: Vec<Dense>,
}

impl DocumentEncoder {
    pub fn new(dimensions: Vec<usize>) -> Self {
        Self {
            dimensions,
            activation: Activation::Relu,
            input_dim: None,
            layers: Vec::new(),
        }
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Initialize dense modules for inputs of width `input_dim`
    pub fn setup(&mut self, input_dim: usize, seed: u64) -> Result<(), DocumentEncoderError> {
        if input_dim == 0 {
            return Err(DocumentEncoderError::InvalidDimension("input_dim must be greater than 0".into()));
        }
        if let Some(pos) = self.dimensions.iter().position(|&d| d == 0) {
            return Err(DocumentEncoderError::InvalidDimension(format!("dimensions[{}] is 0", pos)));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut layers = Vec::with_capacity(self.dimensions.len());
        let mut fan_in = input_dim;
        for &width in &self.dimensions {
            layers.push(Dense::init(fan_in, width, &mut rng)?);
            fan_in = width;
        }

        self.layers = layers;
        self.input_dim = Some(input_dim);
        debug!("Document encoder set up: {} -> {:?} ({} parameters)",
            input_dim, self.dimensions, self.parameter_count());
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.input_dim.is_some()
    }

    pub fn input_dim(&self) -> Option<usize> {
        self.input_dim
    }

    /// Width of the produced embeddings; without layers this is the input width
    pub fn output_dim(&self) -> Option<usize> {
        self.dimensions.last().copied().or(self.input_dim)
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Dense::parameter_count).sum()
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Projects rows of `x` ([n, input_dim]) to [n, output_dim]
    pub fn apply(&self, x: ArrayView2<f32>) -> Result<Array2<f32>, DocumentEncoderError> {
        if self.dimensions.is_empty() {
            return Ok(x.to_owned());
        }
        if self.layers.is_empty() {
            return Err(DocumentEncoderError::NotInitialized);
        }

        let last = self.layers.len() - 1;
        let mut h = self.layers[0].apply(x)?;
        if last > 0 {
            self.activation.apply(&mut h);
        }
        for (i, layer) in self.layers.iter().enumerate().skip(1) {
            h = layer.apply(h.view())?;
            if i < last {
                self.activation.apply(&mut h);
            }
        }
        Ok(h)
    }

    /// Writes the layer parameters as `dense_{i}.kernel` / `dense_{i}.bias`
    pub fn save(&self, path: &Path) -> Result<(), DocumentEncoderError> {
        let input_dim = self.input_dim.ok_or(DocumentEncoderError::NotInitialized)?;

        let mut writer = SafeTensorsWriter::new();
        for (i, layer) in self.layers.iter().enumerate() {
            writer.add_tensor(
                format!("dense_{}.kernel", i),
                vec![layer.in_dim(), layer.out_dim()],
                layer.kernel.iter().copied().collect(),
            )?;
            writer.add_tensor(format!("dense_{}.bias", i), vec![layer.out_dim()], layer.bias.to_vec())?;
        }
        writer.add_metadata(META_DIMENSIONS, format_dimensions(&self.dimensions));
        writer.add_metadata(META_INPUT_DIM, input_dim.to_string());
        writer.add_metadata(META_ACTIVATION, activation_name(self.activation));
        writer.write(path)?;
        Ok(())
    }

    /// Restores a head saved by `save`; `dimensions` must match the stored stack
    pub fn load(path: &Path, dimensions: Vec<usize>) -> Result<Self, DocumentEncoderError> {
        let reader = SafeTensorsReader::open(path)?;
        let meta = |key: &str| {
            reader.metadata.get(key).cloned().ok_or_else(|| {
                DocumentEncoderError::InvalidDimension(format!("checkpoint lacks {} metadata", key))
            })
        };

        let stored = parse_dimensions(&meta(META_DIMENSIONS)?)?;
        if stored != dimensions {
            return Err(DocumentEncoderError::DimensionMismatch { expected: dimensions, actual: stored });
        }
        let input_dim: usize = meta(META_INPUT_DIM)?.parse()
            .map_err(|_| DocumentEncoderError::InvalidDimension("input_dim metadata is not a number".into()))?;
        let activation = reader.metadata.get(META_ACTIVATION)
            .and_then(|a| Activation::parse(a))
            .unwrap_or(Activation::Relu);

        let mut layers = Vec::with_capacity(dimensions.len());
        let mut fan_in = input_dim;
        for (i, &width) in dimensions.iter().enumerate() {
            let (kernel, kernel_shape) = reader.load_f32(&format!("dense_{}.kernel", i))?;
            let (bias, _) = reader.load_f32(&format!("dense_{}.bias", i))?;
            if kernel_shape != [fan_in, width] || bias.len() != width {
                return Err(DocumentEncoderError::InvalidDimension(format!(
                    "dense_{} has kernel {:?} and bias {}, expected [{}, {}]",
                    i, kernel_shape, bias.len(), fan_in, width
                )));
            }
            let kernel = Array2::from_shape_vec((fan_in, width), kernel)
                .map_err(|e| DocumentEncoderError::InvalidDimension(e.to_string()))?;
            layers.push(Dense { kernel, bias: bias.into() });
            fan_in = width;
        }

        Ok(Self {
            dimensions,
            activation,
            input_dim: Some(input_dim),
            layers,
        })
    }
}

fn format_dimensions(dimensions: &[usize]) -> String {
    let parts: Vec<String> = dimensions.iter().map(usize::to_string).collect();
    format!("[{}]", parts.join(","))
}

fn parse_dimensions(raw: &str) -> Result<Vec<usize>, DocumentEncoderError> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner.split(',')
        .map(|d| d.trim().parse::<usize>()
            .map_err(|_| DocumentEncoderError::InvalidDimension(format!("bad dimensions metadata: {}", raw))))
        .collect()
}

fn activation_name(activation: Activation) -> &'static str {
    match activation {
        Activation::Identity => "identity",
        Activation::Relu => "relu",
        Activation::Gelu => "gelu",
        Activation::GeluTanh => "gelu_new",
        Activation::Tanh => "tanh",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_new_has_no_parameters() {
        for dims in [vec![], vec![3], vec![768, 256, 128], vec![0]] {
            let encoder = DocumentEncoder::new(dims.clone());
            assert_eq!(encoder.dimensions, dims);
            assert!(!encoder.is_initialized());
            assert_eq!(encoder.parameter_count(), 0);
        }
    }

    #[test]
    fn test_setup_builds_stack() {
        let mut encoder = DocumentEncoder::new(vec![4, 2]);
        encoder.setup(3, 7).unwrap();
        assert_eq!(encoder.parameter_count(), (3 * 4 + 4) + (4 * 2 + 2));
        assert_eq!(encoder.output_dim(), Some(2));

        let out = encoder.apply(Array2::<f32>::ones((5, 3)).view()).unwrap();
        assert_eq!(out.dim(), (5, 2));
    }

    #[test]
    fn test_setup_is_deterministic() {
        let mut a = DocumentEncoder::new(vec![8]);
        let mut b = DocumentEncoder::new(vec![8]);
        a.setup(4, 42).unwrap();
        b.setup(4, 42).unwrap();
        assert_eq!(a.layers()[0].kernel, b.layers()[0].kernel);

        let mut c = DocumentEncoder::new(vec![8]);
        c.setup(4, 43).unwrap();
        assert_ne!(a.layers()[0].kernel, c.layers()[0].kernel);
    }

    #[test]
    fn test_zero_dimension_rejected_at_setup() {
        let mut encoder = DocumentEncoder::new(vec![4, 0]);
        let err = encoder.setup(3, 0).unwrap_err();
        assert!(matches!(err, DocumentEncoderError::InvalidDimension(_)));
    }

    #[test]
    fn test_apply_before_setup() {
        let encoder = DocumentEncoder::new(vec![4]);
        let err = encoder.apply(Array2::<f32>::zeros((1, 3)).view()).unwrap_err();
        assert!(matches!(err, DocumentEncoderError::NotInitialized));
    }

    #[test]
    fn test_empty_dimensions_is_identity() {
        let encoder = DocumentEncoder::new(vec![]);
        let x = array![[1.0f32, -2.0], [3.0, 4.0]];
        assert_eq!(encoder.apply(x.view()).unwrap(), x);
    }

    #[test]
    fn test_hidden_activation_not_on_output() {
        let mut encoder = DocumentEncoder::new(vec![2, 2]);
        encoder.setup(2, 0).unwrap();
        encoder.layers[0] = Dense { kernel: array![[1.0f32, 0.0], [0.0, 1.0]], bias: array![0.0, 0.0] };
        encoder.layers[1] = Dense { kernel: array![[-1.0f32, 0.0], [0.0, -1.0]], bias: array![0.0, 0.0] };

        let out = encoder.apply(array![[2.0f32, -3.0]].view()).unwrap();
        // ReLU clears -3 after the first layer; the negated output keeps its sign
        assert_eq!(out, array![[-2.0f32, 0.0]]);
    }

    #[test]
    fn test_width_mismatch() {
        let mut encoder = DocumentEncoder::new(vec![2]);
        encoder.setup(3, 0).unwrap();
        let err = encoder.apply(Array2::<f32>::zeros((1, 4)).view()).unwrap_err();
        assert!(matches!(err, DocumentEncoderError::ShapeMismatch { expected: 3, actual: 4 }));
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("head.safetensors");
        let mut encoder = DocumentEncoder::new(vec![5, 3]).with_activation(Activation::Tanh);
        encoder.setup(4, 11).unwrap();
        encoder.save(&path).unwrap();

        let loaded = DocumentEncoder::load(&path, vec![5, 3]).unwrap();
        assert_eq!(loaded.input_dim(), Some(4));
        assert_eq!(loaded.activation(), Activation::Tanh);
        let x = Array2::from_shape_fn((2, 4), |(i, j)| (i * 4 + j) as f32 / 10.0);
        assert_eq!(loaded.apply(x.view()).unwrap(), encoder.apply(x.view()).unwrap());

        let err = DocumentEncoder::load(&path, vec![5, 2]).unwrap_err();
        assert!(matches!(err, DocumentEncoderError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_save_requires_setup() {
        let tmp = tempfile::tempdir().unwrap();
        let encoder = DocumentEncoder::new(vec![2]);
        assert!(encoder.save(&tmp.path().join("x.safetensors")).is_err());
    }
}
