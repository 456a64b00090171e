mod convert;
mod reader;
mod types;
mod writer;

pub use convert::{bf16_to_f32, f16_to_f32};
pub use reader::{is_safetensors_file, SafeTensorsReader};
pub use types::{Dtype, SafeTensorsError, TensorInfo};
pub use writer::SafeTensorsWriter;
