use byteorder::{ByteOrder, LittleEndian};
use rayon::prelude::*;

use super::types::{Dtype, SafeTensorsError};

/// Below this many elements the conversion stays on the calling thread
const PARALLEL_THRESHOLD: usize = 1 << 16;

/// Converts raw little-endian tensor bytes into f32 values
pub fn to_f32(name: &str, bytes: &[u8], dtype: Dtype) -> Result<Vec<f32>, SafeTensorsError> {
    if bytes.len() % dtype.size() != 0 {
        return Err(SafeTensorsError::InvalidFormat(format!(
            "Tensor {} has {} bytes, not a multiple of {} ({:?})",
            name, bytes.len(), dtype.size(), dtype
        )));
    }
    let count = bytes.len() / dtype.size();

    match dtype {
        Dtype::F32 => {
            let mut out = vec![0.0f32; count];
            LittleEndian::read_f32_into(bytes, &mut out);
            Ok(out)
        }
        Dtype::F64 => {
            let mut wide = vec![0.0f64; count];
            LittleEndian::read_f64_into(bytes, &mut wide);
            Ok(wide.into_iter().map(|v| v as f32).collect())
        }
        Dtype::F16 => Ok(convert_half(bytes, count, f16_to_f32)),
        Dtype::BF16 => Ok(convert_half(bytes, count, bf16_to_f32)),
        other => Err(SafeTensorsError::UnsupportedDType(name.to_string(), other)),
    }
}

fn convert_half(bytes: &[u8], count: usize, f: fn(u16) -> f32) -> Vec<f32> {
    if count < PARALLEL_THRESHOLD {
        bytes.chunks_exact(2).map(|c| f(LittleEndian::read_u16(c))).collect()
    } else {
        bytes.par_chunks_exact(2).map(|c| f(LittleEndian::read_u16(c))).collect()
    }
}

/// IEEE 754 binary16 to binary32
pub fn f16_to_f32(h: u16) -> f32 {
    let sign = ((h >> 15) & 1) as u32;
    let exp = ((h >> 10) & 0x1f) as u32;
    let mant = (h & 0x3ff) as u32;

    let bits = if exp == 0 {
        if mant == 0 {
            sign << 31
        } else {
            // Subnormal: shift the mantissa up until the implicit bit appears
            let mut e = 127 - 15 + 1;
            let mut m = mant;
            while m & 0x400 == 0 {
                m <<= 1;
                e -= 1;
            }
            (sign << 31) | (e << 23) | ((m & 0x3ff) << 13)
        }
    } else if exp == 0x1f {
        (sign << 31) | (0xff << 23) | (mant << 13)
    } else {
        (sign << 31) | ((exp + 127 - 15) << 23) | (mant << 13)
    };

    f32::from_bits(bits)
}

/// bfloat16 is the upper half of a binary32
pub fn bf16_to_f32(h: u16) -> f32 {
    f32::from_bits((h as u32) << 16)
}
