//! Collapsed operator families.
//!
//! A family implements shared kernel logic once and is parameterised only
//! by the scalar function each member applies.

pub mod binary_elementwise;

pub use binary_elementwise::BinaryElementwiseOp;
