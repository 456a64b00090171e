use std::fmt;
use std::error::Error;

pub use ::safetensors::Dtype;

/// Location and layout of one tensor inside the data section
#[derive(Debug, Clone)]
pub struct TensorInfo {
    /// Tensor name as stored in the header
    pub name: String,
    /// Element type
    pub dtype: Dtype,
    /// Dimensions, outermost first
    pub shape: Vec<usize>,
    /// Byte range relative to the start of the data section
    pub data_offsets: (usize, usize),
}

impl TensorInfo {
    /// Number of elements described by the shape, `None` if it overflows `usize`
    pub fn element_count(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Number of bytes the shape implies, `None` on overflow
    pub fn expected_byte_len(&self) -> Option<usize> {
        self.element_count()?.checked_mul(self.dtype.size())
    }

    /// Number of bytes the tensor occupies
    pub fn byte_len(&self) -> usize {
        self.data_offsets.1.saturating_sub(self.data_offsets.0)
    }
}

/// Custom error types for safetensors operations
#[derive(Debug)]
pub enum SafeTensorsError {
    /// Wraps std::io::Error for file operations
    IoError(std::io::Error),
    /// Invalid format errors with a message
    InvalidFormat(String),
    /// Requested tensor is absent from the header
    TensorNotFound(String),
    /// Tensor exists but its element type cannot be read as f32
    UnsupportedDType(String, Dtype),
}

impl fmt::Display for SafeTensorsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SafeTensorsError::IoError(e) => write!(f, "I/O error: {}", e),
            SafeTensorsError::InvalidFormat(msg) => write!(f, "Invalid safetensors format: {}", msg),
            SafeTensorsError::TensorNotFound(name) => write!(f, "Tensor not found: {}", name),
            SafeTensorsError::UnsupportedDType(name, dtype) => {
                write!(f, "Unsupported dtype {:?} for tensor {}", dtype, name)
            }
        }
    }
}

impl Error for SafeTensorsError {}

impl From<std::io::Error> for SafeTensorsError {
    fn from(err: std::io::Error) -> Self {
        SafeTensorsError::IoError(err)
    }
}

impl From<::safetensors::SafeTensorError> for SafeTensorsError {
    fn from(err: ::safetensors::SafeTensorError) -> Self {
        match err {
            ::safetensors::SafeTensorError::TensorNotFound(name) => SafeTensorsError::TensorNotFound(name),
            ::safetensors::SafeTensorError::IoError(e) => SafeTensorsError::IoError(e),
            other => SafeTensorsError::InvalidFormat(format!("{:?}", other)),
        }
    }
}
