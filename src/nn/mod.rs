pub mod ops;

pub use ops::{Activation, ShapeError};
