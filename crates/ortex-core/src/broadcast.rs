//! NumPy-style broadcasting for elementwise kernels.

use crate::{Error, Result};

/// Output shape of broadcasting `a` against `b`.
///
/// Shapes are aligned on their trailing dimensions; a missing dimension
/// counts as 1, and two dimensions are compatible when equal or when one of
/// them is 1.
///
/// ```text
/// broadcast_shape(&[2, 3, 4], &[3, 4])       -> [2, 3, 4]
/// broadcast_shape(&[8, 1, 6, 1], &[7, 1, 5]) -> [8, 7, 6, 5]
/// ```
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let rank = a.len().max(b.len());
    let dim = |shape: &[usize], i: usize| {
        let pad = rank - shape.len();
        if i < pad { 1 } else { shape[i - pad] }
    };

    (0..rank)
        .map(|i| match (dim(a, i), dim(b, i)) {
            (da, db) if da == db || db == 1 => Ok(da),
            (1, db) => Ok(db),
            _ => Err(Error::Shape(format!(
                "Cannot broadcast shapes {a:?} and {b:?} at dimension {i}"
            ))),
        })
        .collect()
}

/// Map a flat index into the broadcast `out_shape` back onto an input of
/// shape `in_shape`.
///
/// `in_shape` must be broadcast-compatible with `out_shape`.
pub fn broadcast_source_index(flat: usize, out_shape: &[usize], in_shape: &[usize]) -> usize {
    let pad = out_shape.len() - in_shape.len();
    let mut remaining = flat;
    let mut source = 0;
    let mut stride = 1;

    for axis in (0..out_shape.len()).rev() {
        let extent = out_shape[axis];
        let coord = remaining % extent.max(1);
        remaining /= extent.max(1);

        if axis < pad {
            continue;
        }
        let in_extent = in_shape[axis - pad];
        if in_extent != 1 {
            source += coord * stride;
        }
        stride *= in_extent;
    }

    source
}
