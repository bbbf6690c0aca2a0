//! Matrix multiplication operator.

use ortex_core::{DataType, Error, Kernel, KernelCtx, Result, TensorMeta, TensorView, TensorViewMut};
use std::ops::{Add, Mul};

use crate::helpers::unsupported;

/// Matrix multiplication operator.
///
/// Computes C = A × B where:
/// - A: [...batch..., M, K]
/// - B: [K, N] (shared by every batch) or [...batch..., K, N]
/// - C: [...batch..., M, N]
#[derive(Debug, Clone, Copy, Default)]
pub struct MatMulOp;

impl MatMulOp {
    pub fn create(_ctx: &KernelCtx<'_>) -> Result<Box<dyn Kernel>> {
        Ok(Box::new(MatMulOp))
    }
}

/// Dimensions of one batched product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dims {
    batch: usize,
    m: usize,
    k: usize,
    n: usize,
    shared_rhs: bool,
}

fn matmul_dims(a: &[usize], b: &[usize]) -> Result<(Dims, Vec<usize>)> {
    if a.len() < 2 || b.len() < 2 {
        return Err(Error::Shape(format!(
            "MatMul requires at least 2D tensors, got A: {a:?}, B: {b:?}"
        )));
    }

    let (a_batch, a_mat) = a.split_at(a.len() - 2);
    let (b_batch, b_mat) = b.split_at(b.len() - 2);
    let (m, k) = (a_mat[0], a_mat[1]);
    let (kb, n) = (b_mat[0], b_mat[1]);

    if k != kb {
        return Err(Error::Shape(format!(
            "MatMul inner dimensions differ: A {a:?} has K={k}, B {b:?} has K={kb}"
        )));
    }
    let shared_rhs = b_batch.is_empty();
    if !shared_rhs && a_batch != b_batch {
        return Err(Error::Shape(format!(
            "MatMul batch dimensions differ: A {a:?}, B {b:?}"
        )));
    }

    let mut out = a_batch.to_vec();
    out.extend([m, n]);
    let dims = Dims {
        batch: a_batch.iter().product(),
        m,
        k,
        n,
        shared_rhs,
    };
    Ok((dims, out))
}

fn matmul<T>(a: &[T], b: &[T], c: &mut [T], dims: Dims)
where
    T: Copy + Default + Add<Output = T> + Mul<Output = T>,
{
    let Dims { batch, m, k, n, shared_rhs } = dims;
    for batch_idx in 0..batch {
        let a = &a[batch_idx * m * k..][..m * k];
        let b = if shared_rhs {
            b
        } else {
            &b[batch_idx * k * n..][..k * n]
        };
        let c = &mut c[batch_idx * m * n..][..m * n];

        // i-k-j order keeps the inner loop on contiguous rows of B and C
        for (c_row, a_row) in c.chunks_mut(n.max(1)).zip(a.chunks(k.max(1))) {
            c_row.fill(T::default());
            for (&a_ik, b_row) in a_row.iter().zip(b.chunks(n.max(1))) {
                for (c_ij, &b_kj) in c_row.iter_mut().zip(b_row) {
                    *c_ij = *c_ij + a_ik * b_kj;
                }
            }
        }
    }
}

impl Kernel for MatMulOp {
    fn infer_outputs(&self, inputs: &[TensorMeta]) -> Result<Vec<TensorMeta>> {
        let [a, b] = inputs else {
            return Err(Error::Kernel("MatMul requires two inputs".to_string()));
        };
        let (_, shape) = matmul_dims(&a.shape, &b.shape)?;
        Ok(vec![TensorMeta::new(shape, a.dtype)])
    }

    fn compute(&self, inputs: &[TensorView<'_>], outputs: &mut [TensorViewMut<'_>]) -> Result<()> {
        let (a, b) = (&inputs[0], &inputs[1]);
        let (dims, _) = matmul_dims(a.shape(), b.shape())?;
        let c = &mut outputs[0];

        match a.dtype() {
            DataType::F32 => matmul(a.as_slice::<f32>()?, b.as_slice::<f32>()?, c.as_mut_slice::<f32>()?, dims),
            DataType::F64 => matmul(a.as_slice::<f64>()?, b.as_slice::<f64>()?, c.as_mut_slice::<f64>()?, dims),
            other => return Err(unsupported("MatMul", other)),
        }
        Ok(())
    }
}
