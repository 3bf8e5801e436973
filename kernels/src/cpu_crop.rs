use crate::{check_len, check_rank, strides_of, KernelElem, KernelError, Result};
use rayon::prelude::*;

/// Copies the axis-aligned window `[start, start + size)` out of `data`.
///
/// The output is laid out row-major with shape `size`. Rows of the output are filled in
/// parallel; each row is one contiguous run in the source.
pub fn cpu_crop<T, const RANK: usize>(
    data: &[T],
    shape: &[usize; RANK],
    start: &[usize; RANK],
    size: &[usize; RANK],
) -> Result<Vec<T>>
where
    T: KernelElem,
{
    check_rank::<RANK>()?;
    check_len(data, shape)?;
    check_window(shape, start, size)?;

    let out_len: usize = size.iter().product();
    if out_len == 0 {
        return Ok(Vec::new());
    }

    let strides = strides_of(shape);
    let row = size[RANK - 1];
    let mut out = vec![T::zero(); out_len];
    out.par_chunks_mut(row).enumerate().for_each(|(r, out_row)| {
        let offset = row_offset(r, size, start, &strides);
        out_row.copy_from_slice(&data[offset..offset + row]);
    });
    Ok(out)
}

/// Writes `src` (shape `src_shape`) into `dst` (shape `dst_shape`) at `start`.
pub fn cpu_paste<T, const RANK: usize>(
    dst: &mut [T],
    dst_shape: &[usize; RANK],
    start: &[usize; RANK],
    src: &[T],
    src_shape: &[usize; RANK],
) -> Result<()>
where
    T: KernelElem,
{
    check_rank::<RANK>()?;
    check_len(dst, dst_shape)?;
    check_len(src, src_shape)?;
    check_window(dst_shape, start, src_shape)?;

    if src.is_empty() {
        return Ok(());
    }

    let strides = strides_of(dst_shape);
    let row = src_shape[RANK - 1];
    for (r, src_row) in src.chunks(row).enumerate() {
        let offset = row_offset(r, src_shape, start, &strides);
        dst[offset..offset + row].copy_from_slice(src_row);
    }
    Ok(())
}

fn check_window<const RANK: usize>(
    shape: &[usize; RANK],
    start: &[usize; RANK],
    size: &[usize; RANK],
) -> Result<()> {
    let fits = (0..RANK).all(|d| start[d] + size[d] <= shape[d]);
    if !fits {
        return Err(KernelError::WindowOutOfBounds {
            start: start.to_vec(),
            size: size.to_vec(),
            shape: shape.to_vec(),
        });
    }
    Ok(())
}

/// Source offset of row `row` of a `size`-shaped window placed at `start`.
fn row_offset<const RANK: usize>(
    mut row: usize,
    size: &[usize; RANK],
    start: &[usize; RANK],
    strides: &[usize; RANK],
) -> usize {
    let mut offset = start[RANK - 1];
    for d in (0..RANK - 1).rev() {
        let coord = row % size[d];
        row /= size[d];
        offset += (start[d] + coord) * strides[d];
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_2d() {
        // [0 1 2 3]
        // [4 5 6 7]
        // [8 9 10 11]
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let out = cpu_crop(&data, &[3, 4], &[1, 1], &[2, 2]).unwrap();
        assert_eq!(out, vec![5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn test_crop_4d_leading_edge() {
        // [1, 2, 2, 2] volume, drop the first voxel on each spatial axis.
        let data: Vec<u32> = (0..8).collect();
        let out = cpu_crop(&data, &[1, 2, 2, 2], &[0, 1, 1, 1], &[1, 1, 1, 1]).unwrap();
        assert_eq!(out, vec![7]);
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let data = vec![0.0f32; 4];
        let err = cpu_crop(&data, &[2, 2], &[1, 0], &[2, 2]);
        assert!(matches!(err, Err(KernelError::WindowOutOfBounds { .. })));
    }

    #[test]
    fn test_crop_empty_window() {
        let data = vec![1.0f32; 4];
        let out = cpu_crop(&data, &[2, 2], &[0, 0], &[0, 2]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_paste_roundtrip() {
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let mut dst = vec![0.0f32; 12];
        let windows = [([0, 0], [2, 2]), ([0, 2], [2, 2]), ([2, 0], [1, 4])];
        for (start, size) in windows {
            let patch = cpu_crop(&data, &[3, 4], &start, &size).unwrap();
            cpu_paste(&mut dst, &[3, 4], &start, &patch, &size).unwrap();
        }
        assert_eq!(dst, data);
    }

    #[test]
    fn test_paste_shape_mismatch() {
        let mut dst = vec![0.0f32; 4];
        let err = cpu_paste(&mut dst, &[2, 2], &[0, 0], &[1.0, 2.0], &[2, 2]);
        assert!(matches!(err, Err(KernelError::ShapeMismatch { .. })));
    }
}
