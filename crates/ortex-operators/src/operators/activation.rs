//! Activation operators.

use half::f16;
use ortex_core::{DataType, Error, Kernel, KernelCtx, Result, TensorMeta, TensorView, TensorViewMut};

use crate::helpers::{map_f16_widened, map_with_bias, unsupported};
use crate::math::{fast_gelu_f32, fast_gelu_f64, gelu_exact_f32, gelu_exact_f64};

/// How `Gelu` evaluates the Gaussian CDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeluApproximation {
    /// Exact, through `erf`.
    None,
    /// The tanh formula FastGelu uses.
    Tanh,
}

/// GELU (Gaussian Error Linear Unit) activation operator.
///
/// GELU(x) = x * Φ(x) where Φ(x) is the cumulative distribution function
/// of the standard normal distribution. The `approximate` attribute picks
/// between the erf form (`"none"`, default) and the tanh form (`"tanh"`).
#[derive(Debug, Clone, Copy)]
pub struct GeluOp {
    approximation: GeluApproximation,
}

impl GeluOp {
    pub fn new(approximation: GeluApproximation) -> Self {
        Self { approximation }
    }

    pub fn create(ctx: &KernelCtx<'_>) -> Result<Box<dyn Kernel>> {
        let approximation = match ctx.attr_string_or("approximate", "none")? {
            "none" => GeluApproximation::None,
            "tanh" => GeluApproximation::Tanh,
            other => {
                return Err(Error::Kernel(format!(
                    "Gelu attribute 'approximate' must be \"none\" or \"tanh\", got \"{other}\""
                )));
            }
        };
        Ok(Box::new(GeluOp::new(approximation)))
    }
}

impl Kernel for GeluOp {
    fn infer_outputs(&self, inputs: &[TensorMeta]) -> Result<Vec<TensorMeta>> {
        // Gelu is a unary operation: output shape equals input shape
        let x = inputs
            .first()
            .ok_or_else(|| Error::Kernel("Gelu requires one input".to_string()))?;
        Ok(vec![x.clone()])
    }

    fn compute(&self, inputs: &[TensorView<'_>], outputs: &mut [TensorViewMut<'_>]) -> Result<()> {
        let x = &inputs[0];
        let y = &mut outputs[0];
        let (f32_fn, f64_fn): (fn(f32) -> f32, fn(f64) -> f64) = match self.approximation {
            GeluApproximation::None => (gelu_exact_f32, gelu_exact_f64),
            GeluApproximation::Tanh => (fast_gelu_f32, fast_gelu_f64),
        };

        match x.dtype() {
            DataType::F32 => map_with_bias(x.as_slice::<f32>()?, None, y.as_mut_slice::<f32>()?, f32_fn),
            DataType::F64 => map_with_bias(x.as_slice::<f64>()?, None, y.as_mut_slice::<f64>()?, f64_fn),
            DataType::F16 => map_f16_widened(x.as_slice::<f16>()?, None, y.as_mut_slice::<f16>()?, f32_fn),
            other => return Err(unsupported("Gelu", other)),
        }
        Ok(())
    }
}
