//! Provider traits and their in-memory implementations.

use super::{DevRange, PatchCount, Shape3, Vec3, VolumeDataset};
use crate::error::{Result, SampleError};
use crate::tensor::Tensor;
use std::sync::Arc;

/// Supplies image patches for one network input.
pub trait InputProvider: Send {
    /// The full image volume.
    fn data(&self) -> &Tensor<f32, 4>;

    /// Deviations at which a patch fits inside the volume.
    fn dev_range(&self) -> DevRange;

    fn subvolume(&self, dev: Vec3) -> Result<Tensor<f32, 4>>;

    /// Next patch of the sequential tiling; `None` once exhausted.
    fn next_patch(&mut self) -> Result<Option<Tensor<f32, 4>>>;

    fn output_volume_shape(&self) -> Shape3;

    fn num_patches(&self) -> PatchCount;
}

/// Supplies label and mask patches for one network output.
pub trait OutputProvider: Send {
    fn label(&self) -> &Tensor<u32, 4>;

    fn mask(&self) -> &Tensor<u8, 4>;

    fn center(&self) -> Vec3;

    fn dev_range(&self) -> DevRange;

    /// Absolute `[z, y, x]` voxels, at deviations inside `range`, around which a training
    /// patch may be centered.
    fn candidate_locations(&self, range: &DevRange) -> Vec<Shape3>;

    /// Label and mask windows at the same deviation.
    fn subvolume(&self, dev: Vec3) -> Result<(Tensor<u32, 4>, Tensor<u8, 4>)>;

    fn next_patch(&mut self) -> Result<Option<(Tensor<u32, 4>, Tensor<u8, 4>)>>;

    fn num_patches(&self) -> PatchCount;
}

/// Builds providers from the volume ids named in a sample section.
pub trait ProviderFactory {
    /// `forward` selects inference tiling: the sequential patches step by `out_patch`
    /// instead of by `patch`.
    fn input_image(
        &self,
        id: u32,
        patch: Shape3,
        out_patch: Shape3,
        forward: bool,
    ) -> Result<Box<dyn InputProvider>>;

    fn output_label(
        &self,
        id: u32,
        patch: Shape3,
        out_patch: Shape3,
    ) -> Result<Box<dyn OutputProvider>>;
}

/// Image volume resident in memory.
#[derive(Debug, Clone)]
pub struct InputImage {
    volume: VolumeDataset<f32>,
}

impl InputImage {
    pub fn new(
        image: Arc<Tensor<f32, 4>>,
        patch: Shape3,
        out_patch: Shape3,
        forward: bool,
    ) -> Self {
        let out_patch = if forward { out_patch } else { patch };
        Self {
            volume: VolumeDataset::new(image, patch, out_patch),
        }
    }
}

impl InputProvider for InputImage {
    fn data(&self) -> &Tensor<f32, 4> {
        self.volume.data()
    }

    fn dev_range(&self) -> DevRange {
        self.volume.dev_range()
    }

    fn subvolume(&self, dev: Vec3) -> Result<Tensor<f32, 4>> {
        self.volume.subvolume(dev)
    }

    fn next_patch(&mut self) -> Result<Option<Tensor<f32, 4>>> {
        self.volume.next_patch()
    }

    fn output_volume_shape(&self) -> Shape3 {
        self.volume.output_volume_shape()
    }

    fn num_patches(&self) -> PatchCount {
        self.volume.num_patches()
    }
}

/// Segmentation and validity mask resident in memory.
///
/// Both are single-channel and share one spatial extent. Candidate locations are the
/// voxels whose mask value is non-zero.
#[derive(Debug, Clone)]
pub struct OutputLabel {
    label: VolumeDataset<u32>,
    mask: VolumeDataset<u8>,
}

impl OutputLabel {
    /// # Errors
    ///
    /// `SampleError::ShapeViolation` unless `label` and `mask` are both `[1, Z, Y, X]`
    /// with the same extent.
    pub fn new(
        label: Arc<Tensor<u32, 4>>,
        mask: Arc<Tensor<u8, 4>>,
        patch: Shape3,
        out_patch: Shape3,
    ) -> Result<Self> {
        if label.channels() != 1 || label.shape() != mask.shape() {
            return Err(SampleError::ShapeViolation(format!(
                "label {:?} and mask {:?} must both be single-channel with one extent",
                label.shape(),
                mask.shape()
            )));
        }
        Ok(Self {
            label: VolumeDataset::new(label, patch, out_patch),
            mask: VolumeDataset::new(mask, patch, out_patch),
        })
    }
}

impl OutputProvider for OutputLabel {
    fn label(&self) -> &Tensor<u32, 4> {
        self.label.data()
    }

    fn mask(&self) -> &Tensor<u8, 4> {
        self.mask.data()
    }

    fn center(&self) -> Vec3 {
        self.label.center()
    }

    fn dev_range(&self) -> DevRange {
        self.label.dev_range()
    }

    fn candidate_locations(&self, range: &DevRange) -> Vec<Shape3> {
        let range = range.intersect(&self.dev_range());
        if range.is_empty() {
            return Vec::new();
        }
        let center = self.center();
        let [_, _, sy, sx] = *self.mask.data().shape();
        let mask = self.mask.data().data();

        let mut locations = Vec::new();
        for dz in range.low[0]..=range.high[0] {
            let z = (center[0] + dz) as usize;
            for dy in range.low[1]..=range.high[1] {
                let y = (center[1] + dy) as usize;
                for dx in range.low[2]..=range.high[2] {
                    let x = (center[2] + dx) as usize;
                    if mask[(z * sy + y) * sx + x] > 0 {
                        locations.push([z, y, x]);
                    }
                }
            }
        }
        locations
    }

    fn subvolume(&self, dev: Vec3) -> Result<(Tensor<u32, 4>, Tensor<u8, 4>)> {
        Ok((self.label.subvolume(dev)?, self.mask.subvolume(dev)?))
    }

    fn next_patch(&mut self) -> Result<Option<(Tensor<u32, 4>, Tensor<u8, 4>)>> {
        match (self.label.next_patch()?, self.mask.next_patch()?) {
            (Some(label), Some(mask)) => Ok(Some((label, mask))),
            _ => Ok(None),
        }
    }

    fn num_patches(&self) -> PatchCount {
        self.label.num_patches()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(shape: Shape3) -> Arc<Tensor<u32, 4>> {
        let [z, y, x] = shape;
        Arc::new(Tensor::full([1, z, y, x], 1))
    }

    #[test]
    fn test_output_label_rejects_mismatched_mask() {
        let mask = Arc::new(Tensor::ones([1, 4, 4, 3]));
        let err = OutputLabel::new(label([4, 4, 4]), mask, [2, 2, 2], [2, 2, 2]);
        assert!(matches!(err, Err(SampleError::ShapeViolation(_))));
    }

    #[test]
    fn test_candidates_follow_mask() {
        let mut mask = Tensor::<u8, 4>::zeros([1, 5, 5, 5]);
        mask.data_mut()[(2 * 5 + 2) * 5 + 2] = 1; // center
        mask.data_mut()[(4 * 5 + 4) * 5 + 4] = 1; // corner, outside the range
        let provider =
            OutputLabel::new(label([5, 5, 5]), Arc::new(mask), [3, 3, 3], [3, 3, 3]).unwrap();

        let locations = provider.candidate_locations(&DevRange::unbounded());
        assert_eq!(locations, vec![[2, 2, 2]]);
    }

    #[test]
    fn test_candidates_respect_range() {
        let mask = Arc::new(Tensor::ones([1, 5, 5, 5]));
        let provider = OutputLabel::new(label([5, 5, 5]), mask, [1, 1, 1], [1, 1, 1]).unwrap();
        assert_eq!(provider.candidate_locations(&DevRange::unbounded()).len(), 125);

        let narrow = DevRange::new([0, 0, -1], [0, 0, 1]);
        assert_eq!(
            provider.candidate_locations(&narrow),
            vec![[2, 2, 1], [2, 2, 2], [2, 2, 3]]
        );
    }

    #[test]
    fn test_training_input_tiles_by_patch() {
        let image = Arc::new(Tensor::zeros([1, 8, 8, 8]));
        let training = InputImage::new(image.clone(), [4, 4, 4], [2, 2, 2], false);
        let forward = InputImage::new(image, [4, 4, 4], [2, 2, 2], true);
        assert_eq!(training.num_patches().total, 8);
        assert_eq!(training.output_volume_shape(), [8, 8, 8]);
        assert_eq!(forward.output_volume_shape(), [6, 6, 6]);
        assert_eq!(forward.num_patches().total, 27);
    }
}
