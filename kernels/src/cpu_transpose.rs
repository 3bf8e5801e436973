use crate::{check_len, KernelElem, KernelError, Result};
use rayon::prelude::*;

/// Swaps the last two dimensions of the input data.
///
/// For a `[C, Z, Y, X]` volume this is the Y/X transpose used by data augmentation. Every
/// leading dimension is treated as a batch of independent `[M, N]` matrices.
pub fn cpu_transpose<T, const RANK: usize>(data: &[T], shape: &[usize; RANK]) -> Result<Vec<T>>
where
    T: KernelElem,
{
    if RANK < 2 {
        return Err(KernelError::Unsupported(
            "Transpose requires rank >= 2".into(),
        ));
    }
    check_len(data, shape)?;
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let m = shape[RANK - 2];
    let n = shape[RANK - 1];
    let mut out_data = vec![T::zero(); data.len()];

    // The output has shape [Batch..., N, M]; view it as `batch * N` rows of length `M`.
    out_data
        .as_mut_slice()
        .par_chunks_mut(m)
        .enumerate()
        .for_each(|(i, out_row)| {
            let batch_idx = i / n;
            let col_idx = i % n;
            let input_batch_offset = batch_idx * m * n;
            for (r, out_elem) in out_row.iter_mut().enumerate() {
                *out_elem = data[input_batch_offset + r * n + col_idx];
            }
        });

    Ok(out_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose_simple() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // 2x3
        let result = cpu_transpose(&data, &[2, 3]).unwrap();
        // [1, 4]
        // [2, 5]
        // [3, 6]
        assert_eq!(result, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_transpose_volume_slices() {
        // [C=1, Z=2, Y=2, X=2]: each z-slice is transposed independently.
        let data: Vec<u32> = (0..8).collect();
        let result = cpu_transpose(&data, &[1, 2, 2, 2]).unwrap();
        assert_eq!(result, vec![0, 2, 1, 3, 4, 6, 5, 7]);
    }

    #[test]
    fn test_transpose_rank_one() {
        let err = cpu_transpose(&[1.0f32, 2.0], &[2]);
        assert!(matches!(err, Err(KernelError::Unsupported(_))));
    }

    #[test]
    fn test_transpose_len_mismatch() {
        let err = cpu_transpose(&[1.0f32, 2.0], &[2, 2]);
        assert!(matches!(err, Err(KernelError::ShapeMismatch { .. })));
    }
}
