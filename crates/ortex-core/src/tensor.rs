//! Host tensors and the borrowed views handed to kernels.
//!
//! A [`Tensor`] owns its elements. Kernels never see one directly: the
//! dispatcher lends them a read-only [`TensorView`] per input and a
//! [`TensorViewMut`] per pre-allocated output for the duration of a single
//! call.

use crate::{DataType, Error, Result};
use bytemuck::Pod;
use half::f16;

/// Typed element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F16(Vec<f16>),
    F64(Vec<f64>),
    I64(Vec<i64>),
}

impl TensorData {
    /// Zero-filled storage for `len` elements of `dtype`.
    pub fn zeros(dtype: DataType, len: usize) -> Self {
        match dtype {
            DataType::F32 => TensorData::F32(vec![0.0; len]),
            DataType::F16 => TensorData::F16(vec![f16::ZERO; len]),
            DataType::F64 => TensorData::F64(vec![0.0; len]),
            DataType::I64 => TensorData::I64(vec![0; len]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F16(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DataType {
        match self {
            TensorData::F32(_) => DataType::F32,
            TensorData::F16(_) => DataType::F16,
            TensorData::F64(_) => DataType::F64,
            TensorData::I64(_) => DataType::I64,
        }
    }

    fn as_slice(&self) -> TensorSlice<'_> {
        match self {
            TensorData::F32(v) => TensorSlice::F32(v),
            TensorData::F16(v) => TensorSlice::F16(v),
            TensorData::F64(v) => TensorSlice::F64(v),
            TensorData::I64(v) => TensorSlice::I64(v),
        }
    }

    fn as_slice_mut(&mut self) -> TensorSliceMut<'_> {
        match self {
            TensorData::F32(v) => TensorSliceMut::F32(v),
            TensorData::F16(v) => TensorSliceMut::F16(v),
            TensorData::F64(v) => TensorSliceMut::F64(v),
            TensorData::I64(v) => TensorSliceMut::I64(v),
        }
    }
}

/// Borrowed, typed element slice.
#[derive(Debug, Clone, Copy)]
pub enum TensorSlice<'a> {
    F32(&'a [f32]),
    F16(&'a [f16]),
    F64(&'a [f64]),
    I64(&'a [i64]),
}

/// Mutably borrowed, typed element slice.
#[derive(Debug)]
pub enum TensorSliceMut<'a> {
    F32(&'a mut [f32]),
    F16(&'a mut [f16]),
    F64(&'a mut [f64]),
    I64(&'a mut [i64]),
}

impl TensorSlice<'_> {
    pub fn dtype(&self) -> DataType {
        match self {
            TensorSlice::F32(_) => DataType::F32,
            TensorSlice::F16(_) => DataType::F16,
            TensorSlice::F64(_) => DataType::F64,
            TensorSlice::I64(_) => DataType::I64,
        }
    }
}

impl TensorSliceMut<'_> {
    pub fn dtype(&self) -> DataType {
        match self {
            TensorSliceMut::F32(_) => DataType::F32,
            TensorSliceMut::F16(_) => DataType::F16,
            TensorSliceMut::F64(_) => DataType::F64,
            TensorSliceMut::I64(_) => DataType::I64,
        }
    }
}

/// Rust element types that map onto a [`DataType`].
pub trait Element: Pod + Send + Sync + 'static {
    const DTYPE: DataType;

    fn into_data(values: Vec<Self>) -> TensorData;

    fn from_slice(slice: TensorSlice<'_>) -> Option<&[Self]>;

    fn from_slice_mut<'b>(slice: &'b mut TensorSliceMut<'_>) -> Option<&'b mut [Self]>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DataType = DataType::$variant;

            fn into_data(values: Vec<Self>) -> TensorData {
                TensorData::$variant(values)
            }

            fn from_slice(slice: TensorSlice<'_>) -> Option<&[Self]> {
                match slice {
                    TensorSlice::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn from_slice_mut<'b>(slice: &'b mut TensorSliceMut<'_>) -> Option<&'b mut [Self]> {
                match slice {
                    TensorSliceMut::$variant(values) => Some(&mut **values),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(f32, F32);
impl_element!(f16, F16);
impl_element!(f64, F64);
impl_element!(i64, I64);

/// Shape and element type of a tensor, without its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorMeta {
    pub shape: Vec<usize>,
    pub dtype: DataType,
}

impl TensorMeta {
    pub fn new(shape: impl Into<Vec<usize>>, dtype: DataType) -> Self {
        Self {
            shape: shape.into(),
            dtype,
        }
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Host tensor owning its elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: TensorData,
    shape: Vec<usize>,
}

impl Tensor {
    /// Create a tensor from a vector with a given shape.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the shape product.
    ///
    /// # Example
    /// ```
    /// # use ortex_core::Tensor;
    /// let tensor = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]);
    /// assert_eq!(tensor.shape(), &[2, 2]);
    /// ```
    pub fn from_vec<T: Element>(data: Vec<T>, shape: &[usize]) -> Self {
        let expected_len: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_len,
            "Data length {} doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_len
        );
        Self {
            data: T::into_data(data),
            shape: shape.to_vec(),
        }
    }

    /// Fallible variant of [`Tensor::from_vec`].
    pub fn try_from_vec<T: Element>(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        let expected_len: usize = shape.iter().product();
        if data.len() != expected_len {
            return Err(Error::Shape(format!(
                "Data length {} doesn't match shape {shape:?} (expected {expected_len})",
                data.len()
            )));
        }
        Ok(Self {
            data: T::into_data(data),
            shape: shape.to_vec(),
        })
    }

    /// Zero-filled tensor; used to pre-allocate kernel outputs.
    pub fn zeros(meta: &TensorMeta) -> Self {
        Self {
            data: TensorData::zeros(meta.dtype, meta.numel()),
            shape: meta.shape.clone(),
        }
    }

    /// Parse little-endian element bytes, e.g. a weight initializer.
    pub fn from_le_bytes(bytes: &[u8], dtype: DataType, shape: &[usize]) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if bytes.len() != numel * dtype.size() {
            return Err(Error::Shape(format!(
                "Invalid byte length for {dtype} tensor of shape {shape:?}: expected {}, got {}",
                numel * dtype.size(),
                bytes.len()
            )));
        }

        let data = match dtype {
            DataType::F32 => TensorData::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            DataType::F16 => TensorData::F16(
                bytes
                    .chunks_exact(2)
                    .map(|c| f16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            DataType::F64 => TensorData::F64(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            DataType::I64 => TensorData::I64(
                bytes
                    .chunks_exact(8)
                    .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
        };

        Ok(Self {
            data,
            shape: shape.to_vec(),
        })
    }

    /// Raw element bytes in native byte order.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.data {
            TensorData::F32(v) => bytemuck::cast_slice(v),
            TensorData::F16(v) => bytemuck::cast_slice(v),
            TensorData::F64(v) => bytemuck::cast_slice(v),
            TensorData::I64(v) => bytemuck::cast_slice(v),
        }
    }

    /// Get a typed slice of the elements.
    ///
    /// # Errors
    /// Returns `TypeMismatch` if `T` is not the tensor's element type.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        T::from_slice(self.data.as_slice()).ok_or_else(|| Error::TypeMismatch {
            expected: T::DTYPE.to_string(),
            actual: self.dtype().to_string(),
        })
    }

    /// Copy the elements into a `Vec`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        Ok(self.as_slice::<T>()?.to_vec())
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.data.dtype()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn meta(&self) -> TensorMeta {
        TensorMeta::new(self.shape.clone(), self.dtype())
    }

    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            shape: &self.shape,
            data: self.data.as_slice(),
        }
    }

    pub fn view_mut(&mut self) -> TensorViewMut<'_> {
        TensorViewMut {
            shape: &self.shape,
            data: self.data.as_slice_mut(),
        }
    }
}

/// Read-only view of a tensor for one kernel invocation.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    shape: &'a [usize],
    data: TensorSlice<'a>,
}

impl<'a> TensorView<'a> {
    pub fn new(shape: &'a [usize], data: TensorSlice<'a>) -> Self {
        Self { shape, data }
    }

    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.data.dtype()
    }

    pub fn data(&self) -> TensorSlice<'a> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn meta(&self) -> TensorMeta {
        TensorMeta::new(self.shape, self.dtype())
    }

    /// Typed element slice, or `TypeMismatch`.
    pub fn as_slice<T: Element>(&self) -> Result<&'a [T]> {
        T::from_slice(self.data).ok_or_else(|| Error::TypeMismatch {
            expected: T::DTYPE.to_string(),
            actual: self.dtype().to_string(),
        })
    }
}

/// Write-only view of a pre-allocated output buffer.
///
/// The shape is fixed by the dispatcher before the call; kernels fill the
/// elements and must not try to resize.
#[derive(Debug)]
pub struct TensorViewMut<'a> {
    shape: &'a [usize],
    data: TensorSliceMut<'a>,
}

impl<'a> TensorViewMut<'a> {
    pub fn new(shape: &'a [usize], data: TensorSliceMut<'a>) -> Self {
        Self { shape, data }
    }

    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.data.dtype()
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed mutable element slice, or `TypeMismatch`.
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        let actual = self.dtype();
        T::from_slice_mut(&mut self.data).ok_or_else(|| Error::TypeMismatch {
            expected: T::DTYPE.to_string(),
            actual: actual.to_string(),
        })
    }
}
