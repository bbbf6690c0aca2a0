//! FastGelu: the tanh approximation of GELU, with an optional fused bias.

use half::f16;
use ortex_core::{DataType, Kernel, KernelCtx, Result, TensorMeta, TensorView, TensorViewMut};

use crate::helpers::{check_bias, map_f16_widened, map_with_bias, unsupported};
use crate::math::{fast_gelu_f32, fast_gelu_f64};

/// FastGelu kernel.
///
/// `Y = FastGelu(X)` or, with the optional second input,
/// `Y[i] = FastGelu(X[i] + bias[i % len(bias)])`. Output shape and type
/// equal the input's. `f16` data is widened to `f32` for the arithmetic.
///
/// The kernel is stateless; one instance serves every concurrent run.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastGeluOp;

impl FastGeluOp {
    /// Factory used by both the custom-domain and vendor registrations.
    pub fn create(_ctx: &KernelCtx<'_>) -> Result<Box<dyn Kernel>> {
        Ok(Box::new(FastGeluOp))
    }
}

impl Kernel for FastGeluOp {
    fn infer_outputs(&self, inputs: &[TensorMeta]) -> Result<Vec<TensorMeta>> {
        let [x, rest @ ..] = inputs else {
            return Err(ortex_core::Error::Kernel("FastGelu requires one input".to_string()));
        };
        if let Some(bias) = rest.first() {
            check_bias(x, bias)?;
        }
        Ok(vec![x.clone()])
    }

    fn compute(&self, inputs: &[TensorView<'_>], outputs: &mut [TensorViewMut<'_>]) -> Result<()> {
        let x = &inputs[0];
        let bias = inputs.get(1);
        let y = &mut outputs[0];

        match x.dtype() {
            DataType::F32 => {
                let bias = bias.map(|b| b.as_slice::<f32>()).transpose()?;
                map_with_bias(x.as_slice::<f32>()?, bias, y.as_mut_slice::<f32>()?, fast_gelu_f32);
            }
            DataType::F64 => {
                let bias = bias.map(|b| b.as_slice::<f64>()).transpose()?;
                map_with_bias(x.as_slice::<f64>()?, bias, y.as_mut_slice::<f64>()?, fast_gelu_f64);
            }
            DataType::F16 => {
                let bias = bias.map(|b| b.as_slice::<f16>()).transpose()?;
                map_f16_widened(x.as_slice::<f16>()?, bias, y.as_mut_slice::<f16>()?, fast_gelu_f32);
            }
            other => return Err(unsupported("FastGelu", other)),
        }
        Ok(())
    }
}
