//! Tensor operations.
//!
//! # Overview
//!
//! The sampler only needs data-movement and element-wise operations:
//! - **Geometry**: `crop`, `paste`, `flip`, `transpose` (last two axes), `repeat_leading`.
//! - **Element-wise**: `map`, `map_into`, `cast`, `count_nonzero`.
//!
//! Geometry operations delegate to the row-parallel kernels in `zsample-kernels`;
//! element-wise operations run through `rayon` directly.
//!
//! ```rust
//! use zsample::tensor::Tensor;
//!
//! let t = Tensor::<u32, 2>::new(vec![1, 2, 3, 4, 5, 6], [2, 3]).unwrap();
//! let flipped = t.flip(1).unwrap();
//! assert_eq!(flipped.data(), &[3, 2, 1, 6, 5, 4]);
//! ```

use super::{Cpu, Device, Result, Tensor, TensorElem, TensorError};

use rayon::prelude::*;

impl<T, const RANK: usize, D: Device> Tensor<T, RANK, D>
where
    T: TensorElem,
{
    /// Swaps the last two axes.
    ///
    /// On a `[C, Z, Y, X]` volume this is the Y/X transpose.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::Unsupported` for rank < 2.
    pub fn transpose(&self) -> Result<Self> {
        let out_data = D::transpose(&self.data, &self.shape)?;

        let mut new_shape = self.shape;
        if RANK >= 2 {
            new_shape.swap(RANK - 1, RANK - 2);
        }

        let strides = crate::tensor::compute_strides(&new_shape);
        Ok(Tensor {
            shape: new_shape,
            strides,
            data: out_data,
            device: self.device.clone(),
        })
    }
}

impl<T, const RANK: usize> Tensor<T, RANK, Cpu>
where
    T: TensorElem,
{
    /// Applies a function element-wise to the tensor.
    ///
    /// ```rust
    /// use zsample::tensor::Tensor;
    /// let t = Tensor::<f32, 1>::new(vec![1.0, 2.0, 3.0], [3]).unwrap();
    /// let squared = t.map(|x| x * x);
    /// assert_eq!(squared.data(), &[1.0, 4.0, 9.0]);
    /// ```
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(T) -> T + Sync + Send,
    {
        self.map_into(f)
    }

    /// Applies a function element-wise, producing a tensor of another element type.
    pub fn map_into<U, F>(&self, f: F) -> Tensor<U, RANK, Cpu>
    where
        U: TensorElem,
        F: Fn(T) -> U + Sync + Send,
    {
        let data: Vec<U> = self.data.par_iter().map(|v| f(*v)).collect();
        Tensor::from_parts(data, self.shape)
    }

    /// Converts every element to `U`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::Unsupported` if an element is not representable in `U`.
    pub fn cast<U: TensorElem>(&self) -> Result<Tensor<U, RANK, Cpu>> {
        let data: Option<Vec<U>> = self
            .data
            .par_iter()
            .map(|v| v.to_f64().and_then(U::from_f64))
            .collect();
        let data = data.ok_or_else(|| {
            TensorError::Unsupported(format!(
                "cast of {} elements to {}",
                std::any::type_name::<T>(),
                std::any::type_name::<U>()
            ))
        })?;
        Ok(Tensor::from_parts(data, self.shape))
    }

    /// Number of elements different from zero.
    pub fn count_nonzero(&self) -> usize {
        self.data.par_iter().filter(|v| **v != T::zero()).count()
    }

    /// Reverses the tensor along `axis`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IndexOutOfBounds` if `axis >= RANK`.
    pub fn flip(&self, axis: usize) -> Result<Self> {
        let data = zsample_kernels::cpu_flip(&self.data, &self.shape, axis)?;
        Ok(Tensor::from_parts(data, self.shape))
    }

    /// Copies the window `[start, start + size)` into a new tensor of shape `size`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IndexOutOfBounds` if the window leaves the tensor.
    pub fn crop(&self, start: [usize; RANK], size: [usize; RANK]) -> Result<Self> {
        let data = zsample_kernels::cpu_crop(&self.data, &self.shape, &start, &size)?;
        Ok(Tensor::from_parts(data, size))
    }

    /// Writes `patch` into this tensor with its origin at `start`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IndexOutOfBounds` if the patch does not fit.
    pub fn paste(&mut self, start: [usize; RANK], patch: &Self) -> Result<()> {
        zsample_kernels::cpu_paste(
            &mut self.data,
            &self.shape,
            &start,
            &patch.data,
            &patch.shape,
        )?;
        Ok(())
    }

    /// Tiles the tensor `n` times along its leading axis.
    ///
    /// A `[1, Z, Y, X]` mask becomes `[n, Z, Y, X]` with identical channels.
    pub fn repeat_leading(&self, n: usize) -> Self {
        let mut shape = self.shape;
        if RANK > 0 {
            shape[0] *= n;
        }
        Tensor::from_parts(self.data.repeat(n), shape)
    }
}
