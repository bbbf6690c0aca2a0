//! CPU operator implementations for ortex.
//!
//! This crate provides the kernels and the registries that expose them:
//!
//! - **FastGelu** in two unrelated domains: the custom
//!   `com.my_virtual_npu::FastGelu` (float, float16, double) and the vendor
//!   `com.microsoft::FastGelu` (float). Both take an optional bias.
//! - Built-in **Add** (binary elementwise family, numpy broadcasting),
//!   **MatMul** and **Gelu**.
//!
//! # Example
//!
//! ```
//! use ortex_operators::{CUSTOM_DOMAIN, default_operator_registry};
//!
//! let registry = default_operator_registry().unwrap();
//! let registration = registry.lookup(&CUSTOM_DOMAIN.into(), "FastGelu", 1).unwrap();
//! assert_eq!(registration.descriptor.domain().as_str(), CUSTOM_DOMAIN);
//! ```

pub mod families;
pub mod math;
pub mod operators;

mod helpers;
mod registry;

// Re-export operator types
pub use families::BinaryElementwiseOp;
pub use operators::{FastGeluOp, GeluApproximation, GeluOp, MatMulOp};
pub use registry::{
    CUSTOM_DOMAIN, VENDOR_DOMAIN, core_operator_registry, default_operator_registry,
    fast_gelu_descriptor, register_custom_kernels, vendor_fast_gelu_descriptor,
};
