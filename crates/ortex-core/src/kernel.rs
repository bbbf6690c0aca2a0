//! The kernel seam between the runtime and operator implementations.

use crate::{DataType, Error, OperatorDescriptor, Result, TensorMeta, TensorView, TensorViewMut};
use ortex_graph::{AttributeValue, Node};
use std::fmt;

/// Executable implementation of one operator instance.
///
/// A kernel is created once per graph node at resolution time and then
/// shared by every concurrent run of the plan, so `compute` takes `&self`
/// and must not keep per-call state.
///
/// # Example
///
/// ```
/// use ortex_core::{Kernel, Result, TensorMeta, TensorView, TensorViewMut};
///
/// #[derive(Debug)]
/// struct Negate;
///
/// impl Kernel for Negate {
///     fn infer_outputs(&self, inputs: &[TensorMeta]) -> Result<Vec<TensorMeta>> {
///         Ok(vec![inputs[0].clone()])
///     }
///
///     fn compute(&self, inputs: &[TensorView<'_>], outputs: &mut [TensorViewMut<'_>]) -> Result<()> {
///         let x = inputs[0].as_slice::<f32>()?;
///         for (y, x) in outputs[0].as_mut_slice::<f32>()?.iter_mut().zip(x) {
///             *y = -x;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Kernel: Send + Sync + fmt::Debug {
    /// Output shapes and types for concrete input metadata.
    ///
    /// The dispatcher calls this before every invocation to allocate the
    /// output buffers handed to [`Kernel::compute`].
    fn infer_outputs(&self, inputs: &[TensorMeta]) -> Result<Vec<TensorMeta>>;

    /// Fill `outputs` from `inputs`.
    ///
    /// `inputs` holds the node's present inputs in declaration order.
    /// `outputs` are pre-allocated with the shapes from `infer_outputs`.
    fn compute(&self, inputs: &[TensorView<'_>], outputs: &mut [TensorViewMut<'_>]) -> Result<()>;
}

/// Creates kernels for a registered operator.
pub trait KernelFactory: Send + Sync {
    fn create_kernel(&self, ctx: &KernelCtx<'_>) -> Result<Box<dyn Kernel>>;
}

impl<F> KernelFactory for F
where
    F: Fn(&KernelCtx<'_>) -> Result<Box<dyn Kernel>> + Send + Sync,
{
    fn create_kernel(&self, ctx: &KernelCtx<'_>) -> Result<Box<dyn Kernel>> {
        self(ctx)
    }
}

/// Resolution-time context passed to [`KernelFactory::create_kernel`].
///
/// Provides the node's attributes, the descriptor it resolved to and the
/// element types of its inputs. Concrete shapes are only known per run.
pub struct KernelCtx<'a> {
    pub node: &'a Node,
    pub descriptor: &'a OperatorDescriptor,
    input_types: &'a [DataType],
}

impl<'a> KernelCtx<'a> {
    pub fn new(node: &'a Node, descriptor: &'a OperatorDescriptor, input_types: &'a [DataType]) -> Self {
        Self {
            node,
            descriptor,
            input_types,
        }
    }

    /// Element type of input `index`.
    pub fn input_type(&self, index: usize) -> Result<DataType> {
        self.input_types.get(index).copied().ok_or_else(|| {
            Error::Kernel(format!(
                "Input index {index} out of range (node has {} inputs)",
                self.input_types.len()
            ))
        })
    }

    pub fn attr(&self, name: &str) -> Option<&AttributeValue> {
        self.node.attributes.get(name)
    }

    /// Get a required i64 attribute.
    pub fn attr_i64(&self, name: &str) -> Result<i64> {
        match self.attr(name) {
            Some(AttributeValue::Int(v)) => Ok(*v),
            _ => Err(Error::Kernel(format!("Missing required i64 attribute '{name}'"))),
        }
    }

    /// Get a required f32 attribute.
    pub fn attr_f32(&self, name: &str) -> Result<f32> {
        match self.attr(name) {
            Some(AttributeValue::Float(v)) => Ok(*v),
            _ => Err(Error::Kernel(format!("Missing required f32 attribute '{name}'"))),
        }
    }

    /// String attribute, falling back to `default` when absent.
    pub fn attr_string_or(&self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.node.attributes.get(name) {
            Some(AttributeValue::String(v)) => Ok(v.as_str()),
            None => Ok(default),
            Some(other) => Err(Error::Kernel(format!(
                "Attribute '{name}' must be a string, got {other:?}"
            ))),
        }
    }
}
