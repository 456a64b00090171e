use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use ::safetensors::tensor::TensorView;
use byteorder::{ByteOrder, LittleEndian};

use super::types::{Dtype, SafeTensorsError};

/// Collects f32 tensors and serializes them in safetensors layout
#[derive(Default)]
pub struct SafeTensorsWriter {
    tensors: BTreeMap<String, (Vec<usize>, Vec<f32>)>,
    metadata: BTreeMap<String, String>,
}

impl SafeTensorsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tensor; the value count must match the shape
    pub fn add_tensor(
        &mut self,
        name: impl Into<String>,
        shape: Vec<usize>,
        values: Vec<f32>,
    ) -> Result<(), SafeTensorsError> {
        let name = name.into();
        let expected = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
        if expected != Some(values.len()) {
            return Err(SafeTensorsError::InvalidFormat(format!(
                "Tensor {} has {} values for shape {:?}", name, values.len(), shape
            )));
        }
        self.tensors.insert(name, (shape, values));
        Ok(())
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Serializes everything into one byte buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>, SafeTensorsError> {
        let buffers: Vec<(&String, &Vec<usize>, Vec<u8>)> = self.tensors.iter()
            .map(|(name, (shape, values))| {
                let mut bytes = vec![0u8; values.len() * Dtype::F32.size()];
                LittleEndian::write_f32_into(values, &mut bytes);
                (name, shape, bytes)
            })
            .collect();

        let mut views = HashMap::with_capacity(buffers.len());
        for (name, shape, bytes) in &buffers {
            views.insert((*name).clone(), TensorView::new(Dtype::F32, (*shape).clone(), bytes)?);
        }

        let metadata: Option<HashMap<String, String>> = if self.metadata.is_empty() {
            None
        } else {
            Some(self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        };

        Ok(::safetensors::serialize(&views, &metadata)?)
    }

    /// Writes to `path` through a temporary sibling file
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), SafeTensorsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("safetensors.tmp");
        {
            let mut file = BufWriter::new(File::create(&tmp)?);
            file.write_all(&self.to_bytes()?)?;
            file.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safetensors::{is_safetensors_file, SafeTensorsReader};

    #[test]
    fn test_written_file_reads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("head.safetensors");

        let mut writer = SafeTensorsWriter::new();
        writer.add_tensor("b", vec![3], vec![1.0, 2.0, 3.0]).unwrap();
        writer.add_tensor("a", vec![2, 2], vec![0.5, -0.5, 4.0, 8.0]).unwrap();
        writer.add_metadata("format", "pt");
        writer.write(&path).unwrap();

        assert!(is_safetensors_file(&path));
        let reader = SafeTensorsReader::open(&path).unwrap();
        assert_eq!(reader.tensor_names(), vec!["a", "b"]);
        assert_eq!(reader.metadata.get("format").map(String::as_str), Some("pt"));

        let (values, shape) = reader.load_f32("a").unwrap();
        assert_eq!(shape, vec![2, 2]);
        assert_eq!(values, vec![0.5, -0.5, 4.0, 8.0]);
        assert_eq!(reader.info("b").unwrap().data_offsets, (16, 28));
    }

    #[test]
    fn test_header_is_padded() {
        let mut writer = SafeTensorsWriter::new();
        writer.add_tensor("x", vec![1], vec![1.0]).unwrap();
        let bytes = writer.to_bytes().unwrap();
        let header_len = u64::from_le_bytes(bytes[..8].try_into().unwrap());
        assert_eq!(header_len % 8, 0);
        assert_eq!(bytes.len() as u64, 8 + header_len + 4);
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let mut writer = SafeTensorsWriter::new();
        assert!(writer.add_tensor("x", vec![2, 3], vec![0.0; 5]).is_err());
        assert!(writer.add_tensor("x", vec![usize::MAX, 2], vec![]).is_err());
    }

    #[test]
    fn test_reader_rejects_truncated_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.safetensors");
        let mut writer = SafeTensorsWriter::new();
        writer.add_tensor("x", vec![4], vec![1.0; 4]).unwrap();
        let mut bytes = writer.to_bytes().unwrap();
        bytes.truncate(bytes.len() - 4);
        std::fs::write(&path, bytes).unwrap();

        let err = SafeTensorsReader::open(&path).err().unwrap();
        assert!(matches!(err, SafeTensorsError::InvalidFormat(_)));
    }

    #[test]
    fn test_reader_missing_tensor() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.safetensors");
        let mut writer = SafeTensorsWriter::new();
        writer.add_tensor("x", vec![1], vec![1.0]).unwrap();
        writer.write(&path).unwrap();

        let reader = SafeTensorsReader::open(&path).unwrap();
        assert!(matches!(reader.load_f32("y"), Err(SafeTensorsError::TensorNotFound(_))));
    }

    #[test]
    fn test_not_safetensors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vocab.txt");
        std::fs::write(&path, "[PAD]\n[UNK]\n").unwrap();
        assert!(!is_safetensors_file(&path));
    }
}
