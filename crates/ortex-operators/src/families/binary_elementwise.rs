//! Binary elementwise operator family.
//!
//! Covers: Add

use ortex_core::{
    DataType, Error, Kernel, KernelCtx, Result, TensorMeta, TensorView, TensorViewMut,
    broadcast_shape, broadcast_source_index,
};

use crate::helpers::unsupported;

/// Binary elementwise operator family.
///
/// All members share NumPy-style broadcasting and differ only in the
/// per-type scalar function they apply.
#[derive(Debug, Clone, Copy)]
pub struct BinaryElementwiseOp {
    name: &'static str,
    f32_fn: fn(f32, f32) -> f32,
    f64_fn: fn(f64, f64) -> f64,
    i64_fn: fn(i64, i64) -> i64,
}

impl BinaryElementwiseOp {
    /// Create an Add operator.
    pub fn add() -> Self {
        Self {
            name: "Add",
            f32_fn: |a, b| a + b,
            f64_fn: |a, b| a + b,
            i64_fn: i64::wrapping_add,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Factory for [`BinaryElementwiseOp::add`].
    pub fn create_add(_ctx: &KernelCtx<'_>) -> Result<Box<dyn Kernel>> {
        Ok(Box::new(Self::add()))
    }
}

fn apply<T: Copy>(a: TensorView<'_>, b: TensorView<'_>, out: &mut [T], out_shape: &[usize], f: fn(T, T) -> T) -> Result<()>
where
    T: ortex_core::Element,
{
    let (xs, ys) = (a.as_slice::<T>()?, b.as_slice::<T>()?);

    // Fast path: no broadcasting needed
    if a.shape() == out_shape && b.shape() == out_shape {
        for ((o, &x), &y) in out.iter_mut().zip(xs).zip(ys) {
            *o = f(x, y);
        }
        return Ok(());
    }

    for (i, o) in out.iter_mut().enumerate() {
        let x = xs[broadcast_source_index(i, out_shape, a.shape())];
        let y = ys[broadcast_source_index(i, out_shape, b.shape())];
        *o = f(x, y);
    }
    Ok(())
}

impl Kernel for BinaryElementwiseOp {
    fn infer_outputs(&self, inputs: &[TensorMeta]) -> Result<Vec<TensorMeta>> {
        let [a, b] = inputs else {
            return Err(Error::Kernel(format!("{} requires two inputs", self.name)));
        };
        if a.dtype != b.dtype {
            return Err(Error::TypeMismatch {
                expected: a.dtype.type_str().to_string(),
                actual: b.dtype.type_str().to_string(),
            });
        }
        Ok(vec![TensorMeta::new(broadcast_shape(&a.shape, &b.shape)?, a.dtype)])
    }

    fn compute(&self, inputs: &[TensorView<'_>], outputs: &mut [TensorViewMut<'_>]) -> Result<()> {
        let (a, b) = (inputs[0], inputs[1]);
        let out = &mut outputs[0];
        let shape = out.shape();

        match a.dtype() {
            DataType::F32 => apply(a, b, out.as_mut_slice::<f32>()?, shape, self.f32_fn),
            DataType::F64 => apply(a, b, out.as_mut_slice::<f64>()?, shape, self.f64_fn),
            DataType::I64 => apply(a, b, out.as_mut_slice::<i64>()?, shape, self.i64_fn),
            other => Err(unsupported(self.name, other)),
        }
    }
}
