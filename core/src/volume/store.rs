use super::provider::{InputImage, InputProvider, OutputLabel, OutputProvider, ProviderFactory};
use super::Shape3;
use crate::error::{Result, SampleError};
use crate::tensor::Tensor;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct LabelVolume {
    label: Arc<Tensor<u32, 4>>,
    mask: Arc<Tensor<u8, 4>>,
}

/// In-memory volumes keyed by the ids sample sections refer to.
///
/// Image and label ids live in separate namespaces, so `input = 1, label = 1` addresses
/// image 1 and label 1. Providers share the stored volumes.
#[derive(Debug, Clone, Default)]
pub struct VolumeStore {
    images: HashMap<u32, Arc<Tensor<f32, 4>>>,
    labels: HashMap<u32, LabelVolume>,
}

impl VolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_image(&mut self, id: u32, image: Tensor<f32, 4>) {
        self.images.insert(id, Arc::new(image));
    }

    /// Registers a segmentation. Without a mask every voxel is valid.
    ///
    /// # Errors
    ///
    /// `SampleError::ShapeViolation` if the label is not single-channel or the mask shape
    /// differs from it.
    pub fn insert_label(
        &mut self,
        id: u32,
        label: Tensor<u32, 4>,
        mask: Option<Tensor<u8, 4>>,
    ) -> Result<()> {
        let mask = mask.unwrap_or_else(|| Tensor::ones(*label.shape()));
        if label.channels() != 1 || label.shape() != mask.shape() {
            return Err(SampleError::ShapeViolation(format!(
                "label {id}: shape {:?} with mask {:?}",
                label.shape(),
                mask.shape()
            )));
        }
        self.labels.insert(
            id,
            LabelVolume {
                label: Arc::new(label),
                mask: Arc::new(mask),
            },
        );
        Ok(())
    }
}

impl ProviderFactory for VolumeStore {
    fn input_image(
        &self,
        id: u32,
        patch: Shape3,
        out_patch: Shape3,
        forward: bool,
    ) -> Result<Box<dyn InputProvider>> {
        let image = self
            .images
            .get(&id)
            .ok_or(SampleError::UnknownVolume { kind: "image", id })?;
        debug!(id, ?patch, ?out_patch, forward, "input provider");
        Ok(Box::new(InputImage::new(
            Arc::clone(image),
            patch,
            out_patch,
            forward,
        )))
    }

    fn output_label(
        &self,
        id: u32,
        patch: Shape3,
        out_patch: Shape3,
    ) -> Result<Box<dyn OutputProvider>> {
        let volume = self
            .labels
            .get(&id)
            .ok_or(SampleError::UnknownVolume { kind: "label", id })?;
        debug!(id, ?patch, ?out_patch, "output provider");
        Ok(Box::new(OutputLabel::new(
            Arc::clone(&volume.label),
            Arc::clone(&volume.mask),
            patch,
            out_patch,
        )?))
    }
}
