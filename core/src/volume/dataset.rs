use super::{center_of, DevRange, PatchCount, PatchGrid, Shape3, Vec3};
use crate::error::{Result, SampleError};
use crate::tensor::{Tensor, TensorElem, TensorError};
use std::sync::Arc;

/// A resident `[C, Z, Y, X]` volume together with a patch geometry.
///
/// Random access goes through [`subvolume`](Self::subvolume) with a deviation from the
/// volume center. Sequential access tiles the *output space*, whose extent is
/// `S - patch + out_patch` per axis, with `out_patch`-sized tiles: tile `k` starting at
/// `t` maps to the input window `[t, t + patch)`, and writing a patch back with
/// [`set_next_patch`](Self::set_next_patch) pastes it at `t`.
///
/// The volume is shared behind an `Arc`, so providers built from one store do not copy
/// it. Writing clones it on first use if it is still shared.
#[derive(Debug, Clone)]
pub struct VolumeDataset<T: TensorElem> {
    data: Arc<Tensor<T, 4>>,
    patch: Shape3,
    out_patch: Shape3,
    grid: PatchGrid,
}

impl<T: TensorElem> VolumeDataset<T> {
    pub fn new(data: Arc<Tensor<T, 4>>, patch: Shape3, out_patch: Shape3) -> Self {
        let extent = output_extent(data.spatial_shape(), patch, out_patch);
        Self {
            grid: PatchGrid::new(extent, out_patch),
            data,
            patch,
            out_patch,
        }
    }

    pub fn data(&self) -> &Tensor<T, 4> {
        &self.data
    }

    pub fn patch_shape(&self) -> Shape3 {
        self.patch
    }

    pub fn out_patch_shape(&self) -> Shape3 {
        self.out_patch
    }

    pub fn center(&self) -> Vec3 {
        center_of(self.data.spatial_shape())
    }

    pub fn dev_range(&self) -> DevRange {
        DevRange::for_patch(self.data.spatial_shape(), self.patch)
    }

    /// Extracts the `patch`-sized window whose center sits at `center + dev`.
    ///
    /// # Errors
    ///
    /// `SampleError::DeviationOutOfRange` if the window would leave the volume.
    pub fn subvolume(&self, dev: Vec3) -> Result<Tensor<T, 4>> {
        let range = self.dev_range();
        if !range.contains(dev) {
            return Err(SampleError::DeviationOutOfRange {
                dev,
                low: range.low,
                high: range.high,
            });
        }
        let center = self.center();
        let mut start = [0usize; 4];
        for i in 0..3 {
            // non-negative because dev >= low
            start[i + 1] = (center[i] + dev[i] - (self.patch[i] / 2) as i64) as usize;
        }
        let [c, ..] = *self.data.shape();
        let [pz, py, px] = self.patch;
        Ok(self.data.crop(start, [c, pz, py, px])?)
    }

    /// Next input window of the sequential tiling, or `None` once all have been read.
    pub fn next_patch(&mut self) -> Result<Option<Tensor<T, 4>>> {
        let Some([z, y, x]) = self.grid.next_position() else {
            return Ok(None);
        };
        let [c, ..] = *self.data.shape();
        let [pz, py, px] = self.patch;
        Ok(Some(self.data.crop([0, z, y, x], [c, pz, py, px])?))
    }

    /// Checks that `patch` could be written at the next tile, without writing it.
    ///
    /// # Errors
    ///
    /// `TensorError::ShapeMismatch` unless `patch` is `[C, out_patch]`, and
    /// `SampleError::PatchesExhausted` once every tile has been written.
    pub fn check_next_patch(&self, patch: &Tensor<T, 4>) -> Result<()> {
        let [c, ..] = *self.data.shape();
        let [oz, oy, ox] = self.out_patch;
        if patch.shape() != &[c, oz, oy, ox] {
            return Err(TensorError::ShapeMismatch {
                expected: vec![c, oz, oy, ox],
                got: patch.shape().to_vec(),
            }
            .into());
        }
        if self.grid.count().remaining == 0 {
            return Err(SampleError::PatchesExhausted {
                total: self.grid.len(),
            });
        }
        Ok(())
    }

    /// Writes `patch` at the next tile of the sequential tiling.
    ///
    /// # Errors
    ///
    /// Those of [`check_next_patch`](Self::check_next_patch); nothing is written on error.
    pub fn set_next_patch(&mut self, patch: &Tensor<T, 4>) -> Result<()> {
        self.check_next_patch(patch)?;
        let [z, y, x] = self.grid.next_position().ok_or(SampleError::PatchesExhausted {
            total: self.grid.len(),
        })?;
        Arc::make_mut(&mut self.data).paste([0, z, y, x], patch)?;
        Ok(())
    }

    pub fn num_patches(&self) -> PatchCount {
        self.grid.count()
    }

    /// Rewinds the sequential tiling.
    pub fn reset(&mut self) {
        self.grid.reset();
    }

    /// Extent of the volume an `out_patch` tiling covers: `S - patch + out_patch`.
    pub fn output_volume_shape(&self) -> Shape3 {
        output_extent(self.data.spatial_shape(), self.patch, self.out_patch)
    }

    pub fn into_volume(self) -> Tensor<T, 4> {
        Arc::try_unwrap(self.data).unwrap_or_else(|shared| (*shared).clone())
    }
}

fn output_extent(extent: Shape3, patch: Shape3, out_patch: Shape3) -> Shape3 {
    [0, 1, 2].map(|i| {
        if patch[i] > extent[i] {
            0
        } else {
            extent[i] - patch[i] + out_patch[i]
        }
    })
}
