use crate::{check_len, KernelElem, Result};
use rayon::prelude::*;

/// Evaluates a predicate on every nearest-neighbour edge of a 3-D volume.
///
/// For a `[Z, Y, X]` volume the output has shape `[3, Z-1, Y-1, X-1]`. Entry
/// `(c, z, y, x)` compares the voxel `(z+1, y+1, x+1)` with its neighbour one step back along
/// axis `c` (`c = 0` is z, `1` is y, `2` is x) and is `1` when `edge(voxel, neighbour)` holds.
/// A volume with any axis shorter than 2 yields an empty output.
pub fn cpu_edge_map<T, F>(data: &[T], shape: &[usize; 3], edge: F) -> Result<Vec<T>>
where
    T: KernelElem,
    F: Fn(T, T) -> bool + Sync,
{
    check_len(data, shape)?;
    let [z, y, x] = *shape;
    let (oz, oy, ox) = (
        z.saturating_sub(1),
        y.saturating_sub(1),
        x.saturating_sub(1),
    );
    let vol = oz * oy * ox;
    if vol == 0 {
        return Ok(Vec::new());
    }

    let back = [y * x, x, 1];
    let rows_per_channel = oz * oy;
    let mut out = vec![T::zero(); 3 * vol];
    out.par_chunks_mut(ox).enumerate().for_each(|(r, out_row)| {
        let channel = r / rows_per_channel;
        let rem = r % rows_per_channel;
        let (iz, iy) = (rem / oy, rem % oy);
        let base = (iz + 1) * back[0] + (iy + 1) * back[1] + 1;
        let neighbour = base - back[channel];
        for (i, o) in out_row.iter_mut().enumerate() {
            if edge(data[base + i], data[neighbour + i]) {
                *o = T::one();
            }
        }
    });
    Ok(out)
}

/// Affinity graph of a segmentation: an edge is `1` when both voxels carry the same
/// non-zero segment id.
pub fn cpu_affinity<T>(labels: &[T], shape: &[usize; 3]) -> Result<Vec<T>>
where
    T: KernelElem,
{
    cpu_edge_map(labels, shape, |voxel, neighbour| {
        voxel > T::zero() && voxel == neighbour
    })
}
