//! Helper functions for kernel implementations.

use half::f16;
use half::slice::HalfFloatSliceExt;
use ortex_core::{DataType, Error, Result, TensorMeta};
use std::ops::Add;

/// Elements widened per step on the half-precision path.
pub(crate) const CHUNK: usize = 64;

/// Apply `f` to every element, adding `bias[i % bias.len()]` first when a
/// bias is given.
///
/// `bias.len()` must be non-zero and divide `input.len()`.
pub(crate) fn map_with_bias<T>(input: &[T], bias: Option<&[T]>, output: &mut [T], f: impl Fn(T) -> T)
where
    T: Copy + Add<Output = T>,
{
    debug_assert_eq!(input.len(), output.len());
    match bias {
        None => {
            for (y, &x) in output.iter_mut().zip(input) {
                *y = f(x);
            }
        }
        Some(bias) => {
            for (ys, xs) in output.chunks_mut(bias.len()).zip(input.chunks(bias.len())) {
                for ((y, &x), &b) in ys.iter_mut().zip(xs).zip(bias) {
                    *y = f(x + b);
                }
            }
        }
    }
}

/// Half-precision variant of [`map_with_bias`].
///
/// Each chunk is widened to `f32` before the bias add and before `f`, and
/// narrowed again on store, so no intermediate is ever computed in `f16`.
pub(crate) fn map_f16_widened(input: &[f16], bias: Option<&[f16]>, output: &mut [f16], f: impl Fn(f32) -> f32) {
    debug_assert_eq!(input.len(), output.len());
    let mut wide = [0.0f32; CHUNK];

    for (chunk, (xs, ys)) in input.chunks(CHUNK).zip(output.chunks_mut(CHUNK)).enumerate() {
        let wide = &mut wide[..xs.len()];
        xs.convert_to_f32_slice(wide);

        if let Some(bias) = bias {
            let base = chunk * CHUNK;
            for (j, w) in wide.iter_mut().enumerate() {
                *w += bias[(base + j) % bias.len()].to_f32();
            }
        }
        for w in wide.iter_mut() {
            *w = f(*w);
        }

        ys.convert_from_f32_slice(wide);
    }
}

/// Validate an optional per-channel bias against the main input.
pub(crate) fn check_bias(input: &TensorMeta, bias: &TensorMeta) -> Result<()> {
    if bias.dtype != input.dtype {
        return Err(Error::TypeMismatch {
            expected: input.dtype.type_str().to_string(),
            actual: bias.dtype.type_str().to_string(),
        });
    }
    let (n, b) = (input.numel(), bias.numel());
    if b == 0 || n % b != 0 {
        return Err(Error::Shape(format!(
            "bias of shape {:?} does not tile input of shape {:?}",
            bias.shape, input.shape
        )));
    }
    Ok(())
}

pub(crate) fn unsupported(op: &str, dtype: DataType) -> Error {
    Error::Kernel(format!("{op} has no kernel for {}", dtype.type_str()))
}
