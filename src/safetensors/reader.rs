use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ::safetensors::SafeTensors;
use tracing::debug;

use super::convert;
use super::types::{SafeTensorsError, TensorInfo};

/// Header sizes above this are not plausible for a checkpoint
const MAX_HEADER_LEN: u64 = 100 * 1024 * 1024;

/// Memory-mapped view of a safetensors file
pub struct SafeTensorsReader {
    /// Path to the file
    pub path: PathBuf,
    /// Free-form string metadata from the `__metadata__` entry
    pub metadata: BTreeMap<String, String>,
    /// Tensor layout by name
    tensors: BTreeMap<String, TensorInfo>,
    /// Byte offset of the data section in the file
    data_start: usize,
    data: Mmap,
}

impl SafeTensorsReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SafeTensorsError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // SAFETY: the mapping is read-only and the file is not modified while mapped
        let data = unsafe { Mmap::map(&file)? };

        // Parses the header and checks that offsets tile the data section
        let (header_len, header) = SafeTensors::read_metadata(&data)?;
        let data_start = 8 + header_len;
        let data_len = data.len() - data_start;

        let metadata = header.metadata()
            .as_ref()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let mut tensors = BTreeMap::new();
        for (name, entry) in header.tensors() {
            let info = TensorInfo {
                name: name.clone(),
                dtype: entry.dtype,
                shape: entry.shape.clone(),
                data_offsets: entry.data_offsets,
            };
            check_layout(&info, data_len)?;
            tensors.insert(name, info);
        }

        debug!("Opened {}: {} tensors, {} data bytes", path.display(), tensors.len(), data_len);

        Ok(Self { path, metadata, tensors, data_start, data })
    }

    /// Names of all tensors, sorted
    pub fn tensor_names(&self) -> Vec<&str> {
        self.tensors.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn info(&self, name: &str) -> Result<&TensorInfo, SafeTensorsError> {
        self.tensors.get(name)
            .ok_or_else(|| SafeTensorsError::TensorNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Raw bytes of a tensor, borrowed from the mapping
    pub fn bytes(&self, name: &str) -> Result<&[u8], SafeTensorsError> {
        let info = self.info(name)?;
        let (begin, end) = info.data_offsets;
        Ok(&self.data[self.data_start + begin..self.data_start + end])
    }

    /// Reads a tensor as f32 values together with its shape
    pub fn load_f32(&self, name: &str) -> Result<(Vec<f32>, Vec<usize>), SafeTensorsError> {
        let info = self.info(name)?;
        let values = convert::to_f32(name, self.bytes(name)?, info.dtype)?;
        Ok((values, info.shape.clone()))
    }
}

/// Rejects entries whose shape overflows or disagrees with their byte range
fn check_layout(info: &TensorInfo, data_len: usize) -> Result<(), SafeTensorsError> {
    let invalid = |what: String| SafeTensorsError::InvalidFormat(format!("Tensor {}: {}", info.name, what));

    let (begin, end) = info.data_offsets;
    if end < begin || end > data_len {
        return Err(invalid(format!(
            "data_offsets {:?} outside the data section of {} bytes", info.data_offsets, data_len
        )));
    }
    let expected = info.expected_byte_len()
        .ok_or_else(|| invalid(format!("shape {:?} overflows", info.shape)))?;
    if info.byte_len() != expected {
        return Err(invalid(format!(
            "{} bytes for shape {:?}, expected {}", info.byte_len(), info.shape, expected
        )));
    }
    Ok(())
}

/// Checks whether a file starts with a plausible safetensors header.
///
/// Only the length prefix and the opening brace of the JSON header are read.
pub fn is_safetensors_file<P: AsRef<Path>>(path: P) -> bool {
    let Ok(mut file) = File::open(path.as_ref()) else {
        return false;
    };
    let Ok(file_len) = file.metadata().map(|m| m.len()) else {
        return false;
    };
    let Ok(header_len) = file.read_u64::<LittleEndian>() else {
        return false;
    };
    if header_len == 0 || header_len > MAX_HEADER_LEN || 8 + header_len > file_len {
        return false;
    }
    let mut first = [0u8; 1];
    file.read_exact(&mut first).is_ok() && first[0] == b'{'
}
