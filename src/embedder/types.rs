use std::error::Error;
use std::fmt;

use crate::document_encoder::DocumentEncoderError;
use crate::model::ModelError;

/// How per-token states collapse into one vector per text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pooling {
    /// State of the leading [CLS] token
    #[default]
    Cls,
    /// Average of all non-padding token states
    Mean,
}

impl Pooling {
    pub fn parse(name: &str) -> Result<Self, EmbedderError> {
        match name.to_lowercase().as_str() {
            "cls" => Ok(Pooling::Cls),
            "mean" => Ok(Pooling::Mean),
            other => Err(EmbedderError::InvalidPooling(other.to_string())),
        }
    }
}

/// Custom error types for the embedding pipeline
#[derive(Debug)]
pub enum EmbedderError {
    Tokenizer(Box<dyn Error + Send + Sync>),
    Model(ModelError),
    Projection(DocumentEncoderError),
    /// Vector width differs from what the index or head expects
    Dimension { expected: usize, actual: usize },
    InvalidPooling(String),
}

impl fmt::Display for EmbedderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EmbedderError::Tokenizer(e) => write!(f, "Tokenization failed: {}", e),
            EmbedderError::Model(e) => write!(f, "{}", e),
            EmbedderError::Projection(e) => write!(f, "{}", e),
            EmbedderError::Dimension { expected, actual } => write!(
                f, "Vector has {} dimensions, expected {}", actual, expected
            ),
            EmbedderError::InvalidPooling(name) => write!(f, "Invalid pooling: {}", name),
        }
    }
}

impl Error for EmbedderError {}

impl From<ModelError> for EmbedderError {
    fn from(err: ModelError) -> Self {
        EmbedderError::Model(err)
    }
}

impl From<DocumentEncoderError> for EmbedderError {
    fn from(err: DocumentEncoderError) -> Self {
        EmbedderError::Projection(err)
    }
}
