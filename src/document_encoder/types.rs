use std::error::Error;
use std::fmt;

use crate::safetensors::SafeTensorsError;

/// Custom error types for the document projection head
#[derive(Debug)]
pub enum DocumentEncoderError {
    /// A layer width or input width is unusable
    InvalidDimension(String),
    /// `apply` called before `setup`
    NotInitialized,
    /// Input feature count differs from what the first layer expects
    ShapeMismatch { expected: usize, actual: usize },
    /// Checkpoint was saved for another layer stack
    DimensionMismatch { expected: Vec<usize>, actual: Vec<usize> },
    /// Checkpoint file problem
    Checkpoint(SafeTensorsError),
}

impl fmt::Display for DocumentEncoderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DocumentEncoderError::InvalidDimension(msg) => write!(f, "Invalid dimension: {}", msg),
            DocumentEncoderError::NotInitialized => write!(f, "Document encoder used before setup"),
            DocumentEncoderError::ShapeMismatch { expected, actual } => write!(
                f, "Expected {} input features, got {}", expected, actual
            ),
            DocumentEncoderError::DimensionMismatch { expected, actual } => write!(
                f, "Checkpoint has dimensions {:?}, expected {:?}", actual, expected
            ),
            DocumentEncoderError::Checkpoint(e) => write!(f, "Checkpoint error: {}", e),
        }
    }
}

impl Error for DocumentEncoderError {}

impl From<SafeTensorsError> for DocumentEncoderError {
    fn from(err: SafeTensorsError) -> Self {
        DocumentEncoderError::Checkpoint(err)
    }
}
