use std::error::Error;
use std::fmt;

use ndarray::{Array1, Array2};

use crate::nn::ShapeError;
use crate::safetensors::SafeTensorsError;

/// Hidden states of the encoder for one sequence
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// Final layer states, [seq_len, hidden_size]
    pub last_hidden_state: Array2<f32>,
    /// tanh(dense([CLS] state)), [hidden_size]
    pub pooler_output: Array1<f32>,
}

/// Outputs of both pretraining heads for one sequence
#[derive(Debug, Clone)]
pub struct PreTrainingOutput {
    /// Masked-LM logits, [seq_len, vocab_size]
    pub prediction_logits: Array2<f32>,
    /// Next-sentence logits: index 0 is "is next", index 1 is "random"
    pub seq_relationship_logits: Array1<f32>,
    pub hidden: EncoderOutput,
}

/// Custom error types for encoder loading and inference
#[derive(Debug)]
pub enum ModelError {
    /// Wraps std::io::Error for file operations
    IoError(std::io::Error),
    /// config.json is unreadable or describes an unsupported model
    Config(String),
    /// Weight file problem
    Weights(SafeTensorsError),
    /// No checkpoint tensor matches the parameter
    MissingWeight(String),
    /// Checkpoint tensor has the wrong dimensions
    ShapeMismatch { name: String, expected: Vec<usize>, actual: Vec<usize> },
    /// Input ids or segment ids outside the model's tables
    InvalidInput(String),
    /// More tokens than position embeddings
    SequenceTooLong { length: usize, max: usize },
    /// Shape error inside a forward pass
    Compute(ShapeError),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelError::IoError(e) => write!(f, "I/O error: {}", e),
            ModelError::Config(msg) => write!(f, "Invalid model config: {}", msg),
            ModelError::Weights(e) => write!(f, "Weight file error: {}", e),
            ModelError::MissingWeight(name) => write!(f, "Missing weight: {}", name),
            ModelError::ShapeMismatch { name, expected, actual } => write!(
                f, "Weight {} has shape {:?}, expected {:?}", name, actual, expected
            ),
            ModelError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            ModelError::SequenceTooLong { length, max } => write!(
                f, "Sequence of {} tokens exceeds the {} position embeddings", length, max
            ),
            ModelError::Compute(e) => write!(f, "Forward pass failed: {}", e),
        }
    }
}

impl Error for ModelError {}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::IoError(err)
    }
}

impl From<SafeTensorsError> for ModelError {
    fn from(err: SafeTensorsError) -> Self {
        match err {
            SafeTensorsError::TensorNotFound(name) => ModelError::MissingWeight(name),
            other => ModelError::Weights(other),
        }
    }
}

impl From<ShapeError> for ModelError {
    fn from(err: ShapeError) -> Self {
        ModelError::Compute(err)
    }
}
