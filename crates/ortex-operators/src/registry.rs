//! Pre-populated operator registries.

use ortex_core::{
    DataType, Domain, KernelFactory, OperatorDescriptor, OperatorRegistry, Result, VersionRange,
};
use std::sync::{Arc, OnceLock};

use crate::families::BinaryElementwiseOp;
use crate::operators::{FastGeluOp, GeluOp, MatMulOp};

/// Domain of the project's own operators.
pub const CUSTOM_DOMAIN: &str = "com.my_virtual_npu";

/// Domain of the vendor-supplied contrib operators.
pub const VENDOR_DOMAIN: &str = Domain::MICROSOFT;

const FLOAT_TYPES: [DataType; 3] = [DataType::F32, DataType::F16, DataType::F64];

/// `com.my_virtual_npu::FastGelu`, opset 1.
pub fn fast_gelu_descriptor() -> OperatorDescriptor {
    OperatorDescriptor::builder(CUSTOM_DOMAIN, "FastGelu")
        .versions(VersionRange::single(1))
        .input("X")
        .optional_input("bias")
        .output("Y")
        .types(FLOAT_TYPES)
        .doc(
            "Y = 0.5 * X * (1 + tanh(0.7978845608028654 * (X + 0.044715 * X^3))), \
             with bias added to X first when present",
        )
        .build()
}

/// `com.microsoft::FastGelu`, opset 1, float only.
pub fn vendor_fast_gelu_descriptor() -> OperatorDescriptor {
    OperatorDescriptor::builder(VENDOR_DOMAIN, "FastGelu")
        .versions(VersionRange::single(1))
        .input("X")
        .optional_input("bias")
        .output("Y")
        .types([DataType::F32])
        .doc("Vendor FastGelu (tanh approximation of GELU)")
        .build()
}

/// Returns a registry pre-populated with the built-in and vendor operators.
///
/// The registry includes:
/// - `Add` for opsets 7..=12 and 13..=21, one shared kernel with broadcasting
/// - `MatMul` for opsets 1..=21
/// - `Gelu` for opsets 20..=21
/// - `com.microsoft::FastGelu` v1
///
/// Custom operators are added with [`register_custom_kernels`].
pub fn core_operator_registry() -> Result<OperatorRegistry> {
    let mut registry = OperatorRegistry::new();

    // Binary elementwise operators
    let add: Arc<dyn KernelFactory> = Arc::new(BinaryElementwiseOp::create_add);
    for versions in [VersionRange::new(7, 12), VersionRange::new(13, 21)] {
        let descriptor = OperatorDescriptor::builder("", "Add")
            .versions(versions)
            .input("A")
            .input("B")
            .output("C")
            .types([DataType::F32, DataType::F64, DataType::I64])
            .doc("Elementwise addition with numpy broadcasting")
            .build();
        registry.register_arc(Arc::new(descriptor), Arc::clone(&add))?;
    }

    // Matrix operators
    registry.register(
        OperatorDescriptor::builder("", "MatMul")
            .versions(VersionRange::new(1, 21))
            .input("A")
            .input("B")
            .output("Y")
            .types([DataType::F32, DataType::F64])
            .doc("Matrix product over the last two axes")
            .build(),
        MatMulOp::create,
    )?;

    // Activations
    registry.register(
        OperatorDescriptor::builder("", "Gelu")
            .versions(VersionRange::new(20, 21))
            .input("X")
            .output("Y")
            .types(FLOAT_TYPES)
            .doc("GELU; attribute 'approximate' selects \"none\" (erf) or \"tanh\"")
            .build(),
        GeluOp::create,
    )?;

    // Vendor contrib operators
    registry.register(vendor_fast_gelu_descriptor(), FastGeluOp::create)?;

    Ok(registry)
}

/// The one factory instance behind every custom FastGelu registration.
fn custom_fast_gelu_factory() -> Arc<dyn KernelFactory> {
    static FACTORY: OnceLock<Arc<dyn KernelFactory>> = OnceLock::new();
    let factory = FACTORY.get_or_init(|| -> Arc<dyn KernelFactory> { Arc::new(FastGeluOp::create) });
    Arc::clone(factory)
}

/// Register the `com.my_virtual_npu` operators.
///
/// Calling this twice on the same registry is a no-op the second time.
/// Any other registration already claiming one of these operators and
/// versions is a `Conflict`, even one with an equal descriptor.
pub fn register_custom_kernels(registry: &mut OperatorRegistry) -> Result<()> {
    let descriptor = fast_gelu_descriptor();
    let factory = custom_fast_gelu_factory();
    if registry.contains_registration(&descriptor, &factory) {
        tracing::debug!(operator = %descriptor.key(), "custom kernels already registered");
        return Ok(());
    }
    registry.register_arc(Arc::new(descriptor), factory)
}

/// Built-in, vendor and custom operators, frozen for sharing.
pub fn default_operator_registry() -> Result<Arc<OperatorRegistry>> {
    let mut registry = core_operator_registry()?;
    register_custom_kernels(&mut registry)?;
    Ok(registry.freeze())
}
