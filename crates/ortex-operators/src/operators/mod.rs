//! Individual operator implementations that don't fit into families.

pub mod activation;
pub mod fast_gelu;
pub mod matmul;

// Re-export all operators
pub use activation::{GeluApproximation, GeluOp};
pub use fast_gelu::FastGeluOp;
pub use matmul::MatMulOp;
