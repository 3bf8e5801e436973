//! Dense volume tensors.
//!
//! A sampled volume is a 4-D tensor laid out `[C, Z, Y, X]`: a channel axis followed by the
//! three spatial axes. Image volumes are `Tensor<f32, 4>`, segmentations `Tensor<u32, 4>`,
//! validity masks `Tensor<u8, 4>`, and derived targets, masks and weights use a
//! floating-point element type chosen by the `dtype` option (see [`FloatElem`]).
//!
//! ```rust
//! use zsample::tensor::Tensor;
//!
//! let vol = Tensor::<u32, 4>::new((0..8).collect(), [1, 2, 2, 2]).unwrap();
//! assert_eq!(vol.shape(), &[1, 2, 2, 2]);
//! assert_eq!(vol.spatial_shape(), [2, 2, 2]);
//! ```
//!
//! `Tensor` uses row-major (C-style) layout: the last dimension (X) changes fastest, so an
//! X-row is always one contiguous run. The kernels in `zsample-kernels` parallelise over
//! those rows.

use num_traits::{Float, FromPrimitive, Num, NumAssign, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;
use zsample_kernels::KernelError;

pub mod device;
pub mod ops;
pub mod storage;

pub use device::{Cpu, Device};
pub use storage::Storage;

/// Error type for Tensor operations.
#[derive(Error, Debug)]
pub enum TensorError {
    /// The shape of the data does not match the expected shape.
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// An index is out of bounds for the given shape.
    #[error("Index out of bounds: index {index:?} for shape {shape:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },
    /// The requested operation is not supported (e.g., for a specific rank or type).
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<KernelError> for TensorError {
    fn from(e: KernelError) -> Self {
        match e {
            KernelError::ShapeMismatch { expected, got } => {
                TensorError::ShapeMismatch { expected, got }
            }
            KernelError::WindowOutOfBounds { start, size, shape } => {
                let index = start.iter().zip(&size).map(|(s, n)| s + n).collect();
                TensorError::IndexOutOfBounds { index, shape }
            }
            KernelError::AxisOutOfRange { axis, rank } => TensorError::IndexOutOfBounds {
                index: vec![axis],
                shape: vec![rank],
            },
            KernelError::Unsupported(msg) => TensorError::Unsupported(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, TensorError>;

/// Trait bound for elements that can be stored in a Tensor.
///
/// # Requirements
/// - `Copy + Clone`: Essential for efficient storage in contiguous memory (e.g., `Vec<T>`)
///   and fast element access.
/// - `Num + ...`: Provides necessary numeric operations for tensor math.
/// - `Send + Sync`: Required for parallel execution via `rayon`.
pub trait TensorElem:
    Num + NumAssign + Copy + Clone + Debug + Send + Sync + FromPrimitive + ToPrimitive + PartialOrd
{
}

impl<T> TensorElem for T where
    T: Num
        + NumAssign
        + Copy
        + Clone
        + Debug
        + Send
        + Sync
        + FromPrimitive
        + ToPrimitive
        + PartialOrd
{
}

/// Numeric element type of generated masks and weights, as named in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    #[default]
    Float32,
    Float64,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }
}

/// Floating-point element used for targets, masks and rebalance weights.
pub trait FloatElem: TensorElem + Float {
    const DTYPE: DType;
}

impl FloatElem for f32 {
    const DTYPE: DType = DType::Float32;
}

impl FloatElem for f64 {
    const DTYPE: DType = DType::Float64;
}

/// The core Tensor struct.
///
/// Represents an N-dimensional array of elements.
///
/// # Generics
///
/// - `T`: The element type (must implement `TensorElem`).
/// - `RANK`: The number of dimensions (const generic).
/// - `D`: The device where data is stored (defaults to `Cpu`).
///
/// The rank is part of the type while the extents are not: patch shapes vary per network
/// and per channel, so shape mismatches are reported at runtime as `TensorError`.
#[derive(Clone)]
pub struct Tensor<T, const RANK: usize, D: Device = Cpu>
where
    T: TensorElem,
{
    shape: [usize; RANK],
    strides: [usize; RANK],
    data: D::Storage<T>,
    device: D,
}

impl<T, const RANK: usize> Tensor<T, RANK, Cpu>
where
    T: TensorElem,
{
    /// Creates a new Tensor from a vector of data and a shape.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if the length of `data` does not match the product
    /// of `shape`.
    pub fn new(data: Vec<T>, shape: [usize; RANK]) -> Result<Self> {
        let size: usize = shape.iter().product();
        if data.len() != size {
            return Err(TensorError::ShapeMismatch {
                expected: vec![size],
                got: vec![data.len()],
            });
        }

        Ok(Self::from_parts(data, shape))
    }

    /// Wraps data whose length is already known to match `shape`.
    pub(crate) fn from_parts(data: Vec<T>, shape: [usize; RANK]) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        let strides = compute_strides(&shape);
        Self {
            shape,
            strides,
            data,
            device: Cpu,
        }
    }

    /// Creates a new Tensor filled with `value`.
    pub fn full(shape: [usize; RANK], value: T) -> Self {
        let size: usize = shape.iter().product();
        Self::from_parts(vec![value; size], shape)
    }

    /// Creates a new Tensor filled with zeros.
    pub fn zeros(shape: [usize; RANK]) -> Self {
        Self::full(shape, T::zero())
    }

    /// Creates a new Tensor filled with ones.
    pub fn ones(shape: [usize; RANK]) -> Self {
        Self::full(shape, T::one())
    }

    /// Consumes the tensor and returns its flat data.
    pub fn into_data(self) -> Vec<T> {
        self.data
    }
}

impl<T> Tensor<T, 4, Cpu>
where
    T: TensorElem,
{
    /// Number of channels (the leading axis of a `[C, Z, Y, X]` volume).
    pub fn channels(&self) -> usize {
        self.shape[0]
    }

    /// The `[Z, Y, X]` extent of a volume.
    pub fn spatial_shape(&self) -> [usize; 3] {
        [self.shape[1], self.shape[2], self.shape[3]]
    }

    /// Flat data of channel `c`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IndexOutOfBounds` if `c >= channels()`.
    pub fn channel(&self, c: usize) -> Result<&[T]> {
        if c >= self.shape[0] {
            return Err(TensorError::IndexOutOfBounds {
                index: vec![c],
                shape: self.shape.to_vec(),
            });
        }
        let len = self.strides[0];
        Ok(&self.data[c * len..(c + 1) * len])
    }
}

/// Computes the strides for a given shape.
///
/// Strides represent the number of elements to skip in memory to move to the next element
/// along a specific dimension. This implementation assumes a row-major (C-style) memory layout.
pub(crate) const fn compute_strides<const RANK: usize>(shape: &[usize; RANK]) -> [usize; RANK] {
    let mut strides = [0; RANK];
    let mut stride = 1;
    let mut i = RANK;
    while i > 0 {
        i -= 1;
        strides[i] = stride;
        stride *= shape[i];
    }
    strides
}

impl<T, const RANK: usize, D: Device> Tensor<T, RANK, D>
where
    T: TensorElem,
{
    /// Returns the shape of the tensor.
    pub const fn shape(&self) -> &[usize; RANK] {
        &self.shape
    }

    /// Returns the strides of the tensor.
    pub const fn strides(&self) -> &[usize; RANK] {
        &self.strides
    }

    /// Returns a reference to the underlying data as a slice.
    pub fn data(&self) -> &[T] {
        self.data.as_slice()
    }

    /// Returns a mutable reference to the underlying data as a slice.
    pub fn data_mut(&mut self) -> &mut [T] {
        self.data.as_mut_slice()
    }

    /// Returns the total number of elements in the tensor.
    pub const fn size(&self) -> usize {
        let mut size = 1;
        let mut i = 0;
        while i < RANK {
            size *= self.shape[i];
            i += 1;
        }
        size
    }

    /// Returns `true` if the tensor holds no elements.
    pub const fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl<T, const RANK: usize, D: Device> Debug for Tensor<T, RANK, D>
where
    T: TensorElem,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("device", &self.device.name())
            .field("data_len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_creation() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let tensor = Tensor::<f32, 2>::new(data.clone(), [2, 2]).unwrap();
        assert_eq!(tensor.shape(), &[2, 2]);
        assert_eq!(tensor.data(), &data[..]);

        let err = Tensor::<f32, 2>::new(vec![1.0, 2.0, 3.0], [2, 2]);
        assert!(matches!(err, Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_zeros_ones_full() {
        let zeros = Tensor::<f32, 4>::zeros([1, 1, 2, 3]);
        assert_eq!(zeros.data(), &[0.0; 6]);

        let ones = Tensor::<u8, 4>::ones([1, 1, 2, 3]);
        assert_eq!(ones.data(), &[1; 6]);

        let sevens = Tensor::<u32, 2>::full([2, 2], 7);
        assert_eq!(sevens.data(), &[7, 7, 7, 7]);
    }

    #[test]
    fn test_volume_accessors() {
        let t = Tensor::<u32, 4>::new((0..16).collect(), [2, 2, 2, 2]).unwrap();
        assert_eq!(t.channels(), 2);
        assert_eq!(t.spatial_shape(), [2, 2, 2]);
        assert_eq!(t.channel(1).unwrap(), &[8, 9, 10, 11, 12, 13, 14, 15]);
        assert!(matches!(
            t.channel(2),
            Err(TensorError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_empty_tensor() {
        let t = Tensor::<f32, 4>::zeros([3, 0, 0, 0]);
        assert!(t.is_empty());
        assert_eq!(t.size(), 0);
    }

    #[test]
    fn test_compute_strides() {
        let strides = compute_strides(&[2, 3, 4]);
        assert_eq!(strides, [12, 4, 1]);
    }

    #[test]
    fn test_kernel_error_conversion() {
        let err: TensorError = KernelError::WindowOutOfBounds {
            start: vec![1, 1],
            size: vec![2, 2],
            shape: vec![2, 2],
        }
        .into();
        assert_eq!(
            format!("{}", err),
            "Index out of bounds: index [3, 3] for shape [2, 2]"
        );

        let err: TensorError = KernelError::Unsupported("foo".to_string()).into();
        assert_eq!(format!("{}", err), "Unsupported operation: foo");
    }

    #[test]
    fn test_dtype_tags() {
        assert_eq!(<f32 as FloatElem>::DTYPE, DType::Float32);
        assert_eq!(<f64 as FloatElem>::DTYPE, DType::Float64);
        assert_eq!(DType::default().as_str(), "float32");
    }

    #[test]
    fn test_tensor_debug() {
        let t = Tensor::<f32, 1>::new(vec![1.0], [1]).unwrap();
        let debug_str = format!("{:?}", t);
        assert!(debug_str.contains("Tensor"));
        assert!(debug_str.contains("CPU"));
    }
}
