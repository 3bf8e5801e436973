//! Rank-generic CPU kernels for volumetric patch sampling.
//!
//! Every kernel works on a flat, row-major slice plus its shape and returns a freshly
//! allocated `Vec<T>` (or writes into a destination slice). Work is split over the rows of
//! the output (the last dimension) and parallelised with `rayon`.

use num_traits::{FromPrimitive, Num, NumAssign, ToPrimitive};
use std::fmt::Debug;
use thiserror::Error;

pub mod cpu_crop;
pub mod cpu_edge;
pub mod cpu_flip;
pub mod cpu_transpose;

pub use cpu_crop::{cpu_crop, cpu_paste};
pub use cpu_edge::{cpu_affinity, cpu_edge_map};
pub use cpu_flip::cpu_flip;
pub use cpu_transpose::cpu_transpose;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Window out of bounds: start {start:?} size {size:?} for shape {shape:?}")]
    WindowOutOfBounds {
        start: Vec<usize>,
        size: Vec<usize>,
        shape: Vec<usize>,
    },
    #[error("Axis {axis} out of range for rank {rank}")]
    AxisOutOfRange { axis: usize, rank: usize },
    #[error("Unsupported kernel input: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, KernelError>;

/// Trait bound for elements that can be processed by kernels.
/// This mirrors `TensorElem` in the main crate to avoid circular dependencies.
pub trait KernelElem:
    Num + NumAssign + Copy + Clone + Debug + Send + Sync + FromPrimitive + ToPrimitive + PartialOrd
{
}

impl<T> KernelElem for T where
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

/// Row-major strides for `shape`.
pub(crate) fn strides_of<const RANK: usize>(shape: &[usize; RANK]) -> [usize; RANK] {
    let mut strides = [0; RANK];
    let mut stride = 1;
    for i in (0..RANK).rev() {
        strides[i] = stride;
        stride *= shape[i];
    }
    strides
}

pub(crate) fn check_len<T, const RANK: usize>(data: &[T], shape: &[usize; RANK]) -> Result<()> {
    let size: usize = shape.iter().product();
    if data.len() != size {
        return Err(KernelError::ShapeMismatch {
            expected: vec![size],
            got: vec![data.len()],
        });
    }
    Ok(())
}

pub(crate) fn check_rank<const RANK: usize>() -> Result<()> {
    if RANK == 0 {
        return Err(KernelError::Unsupported("rank-0 data has no rows".into()));
    }
    Ok(())
}
