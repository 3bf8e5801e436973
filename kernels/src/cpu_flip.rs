use crate::{check_len, check_rank, strides_of, KernelElem, KernelError, Result};
use rayon::prelude::*;

/// Reverses `data` along `axis`.
///
/// Each output row is copied from its mirrored source row; flipping the last axis reverses
/// the row itself.
pub fn cpu_flip<T, const RANK: usize>(
    data: &[T],
    shape: &[usize; RANK],
    axis: usize,
) -> Result<Vec<T>>
where
    T: KernelElem,
{
    check_rank::<RANK>()?;
    if axis >= RANK {
        return Err(KernelError::AxisOutOfRange { axis, rank: RANK });
    }
    check_len(data, shape)?;
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let strides = strides_of(shape);
    let row = shape[RANK - 1];
    let mut out = vec![T::zero(); data.len()];
    out.par_chunks_mut(row).enumerate().for_each(|(r, out_row)| {
        let mut rem = r;
        let mut offset = 0;
        for d in (0..RANK - 1).rev() {
            let mut coord = rem % shape[d];
            rem /= shape[d];
            if d == axis {
                coord = shape[d] - 1 - coord;
            }
            offset += coord * strides[d];
        }
        let src = &data[offset..offset + row];
        if axis == RANK - 1 {
            for (o, v) in out_row.iter_mut().zip(src.iter().rev()) {
                *o = *v;
            }
        } else {
            out_row.copy_from_slice(src);
        }
    });
    Ok(out)
}
