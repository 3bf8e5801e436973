use super::NamedPatches;
use crate::error::{Result, SampleError};
use crate::net::NetworkShapes;
use crate::tensor::{FloatElem, Tensor};
use crate::volume::{PatchCount, Shape3, VolumeDataset};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Zero-initialised output volumes that network outputs are written back into.
///
/// Each output channel gets a `[C, output_volume_shape]` volume tiled by its patch shape
/// in the same order a forward-mode input is read, so writing outputs in the order the
/// inputs were produced reassembles the full prediction.
#[derive(Debug, Clone)]
pub struct OutputAccumulator<W: FloatElem> {
    volumes: BTreeMap<String, VolumeDataset<W>>,
}

impl<W: FloatElem> OutputAccumulator<W> {
    pub fn new(net: &dyn NetworkShapes, output_volume_shape: Shape3) -> Self {
        let [z, y, x] = output_volume_shape;
        let volumes = net
            .outputs_setsz()
            .into_iter()
            .map(|(name, [c, pz, py, px])| {
                let volume = Arc::new(Tensor::zeros([c, z, y, x]));
                (name, VolumeDataset::new(volume, [pz, py, px], [pz, py, px]))
            })
            .collect();
        Self { volumes }
    }

    /// Writes one patch per output channel at the next tile.
    ///
    /// Every channel advances together: `outputs` must hold exactly one patch per network
    /// output, and all of them are checked before any is written.
    ///
    /// # Errors
    ///
    /// `SampleError::UnknownChannel` for a name the network does not output,
    /// `SampleError::MissingOutput` for an output without a patch, plus the shape and
    /// exhaustion errors of [`VolumeDataset::check_next_patch`]. No channel advances on
    /// error.
    pub fn set_next_patch(&mut self, outputs: &NamedPatches<W>) -> Result<()> {
        if let Some(name) = outputs.keys().find(|k| !self.volumes.contains_key(*k)) {
            return Err(SampleError::UnknownChannel(name.clone()));
        }
        for (name, volume) in &self.volumes {
            let patch = outputs
                .get(name)
                .ok_or_else(|| SampleError::MissingOutput(name.clone()))?;
            volume.check_next_patch(patch)?;
        }
        for (name, volume) in &mut self.volumes {
            if let Some(patch) = outputs.get(name) {
                volume.set_next_patch(patch)?;
            }
        }
        Ok(())
    }

    pub fn num_patches(&self) -> BTreeMap<String, PatchCount> {
        self.volumes
            .iter()
            .map(|(k, v)| (k.clone(), v.num_patches()))
            .collect()
    }

    /// `true` once every tile of every output has been written.
    pub fn is_complete(&self) -> bool {
        self.volumes.values().all(|v| v.num_patches().remaining == 0)
    }

    pub fn volume(&self, name: &str) -> Option<&Tensor<W, 4>> {
        self.volumes.get(name).map(VolumeDataset::data)
    }

    pub fn into_volumes(self) -> NamedPatches<W> {
        self.volumes
            .into_iter()
            .map(|(k, v)| (k, v.into_volume()))
            .collect()
    }
}
