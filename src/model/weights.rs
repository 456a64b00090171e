use std::path::Path;

use ndarray::{Array1, Array2};

use super::types::ModelError;
use crate::safetensors::SafeTensorsReader;

/// Prefix checkpoints saved from a model with heads put before encoder weights
const BASE_MODEL_PREFIX: &str = "bert.";

/// Looks up checkpoint tensors by their canonical parameter names.
///
/// Accepts names with or without the `bert.` prefix, and the legacy
/// `gamma`/`beta` spelling for LayerNorm parameters.
pub struct WeightStore {
    reader: SafeTensorsReader,
}

impl WeightStore {
    pub fn open(path: &Path) -> Result<Self, ModelError> {
        Ok(Self { reader: SafeTensorsReader::open(path)? })
    }

    pub fn tensor_count(&self) -> usize {
        self.reader.len()
    }

    /// Checkpoint name holding `name`, if any
    pub fn resolve(&self, name: &str) -> Option<String> {
        candidates(name).into_iter().find(|c| self.reader.contains(c))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn matrix(&self, name: &str, rows: usize, cols: usize) -> Result<Array2<f32>, ModelError> {
        let (values, shape) = self.load(name, &[rows, cols])?;
        Array2::from_shape_vec((shape[0], shape[1]), values)
            .map_err(|e| ModelError::Config(format!("{}: {}", name, e)))
    }

    pub fn vector(&self, name: &str, len: usize) -> Result<Array1<f32>, ModelError> {
        let (values, _) = self.load(name, &[len])?;
        Ok(Array1::from_vec(values))
    }

    fn load(&self, name: &str, expected: &[usize]) -> Result<(Vec<f32>, Vec<usize>), ModelError> {
        let stored = self.resolve(name)
            .ok_or_else(|| ModelError::MissingWeight(name.to_string()))?;
        let (values, shape) = self.reader.load_f32(&stored)?;
        if shape != expected {
            return Err(ModelError::ShapeMismatch {
                name: stored,
                expected: expected.to_vec(),
                actual: shape,
            });
        }
        Ok((values, shape))
    }
}

fn candidates(name: &str) -> Vec<String> {
    let mut spellings = vec![name.to_string()];
    if name.contains("LayerNorm.") {
        if let Some(base) = name.strip_suffix(".weight") {
            spellings.push(format!("{}.gamma", base));
        } else if let Some(base) = name.strip_suffix(".bias") {
            spellings.push(format!("{}.beta", base));
        }
    }

    let mut all = spellings.clone();
    for spelling in spellings {
        match spelling.strip_prefix(BASE_MODEL_PREFIX) {
            Some(bare) => all.push(bare.to_string()),
            None => all.push(format!("{}{}", BASE_MODEL_PREFIX, spelling)),
        }
    }
    all
}
