//! Training samples.
//!
//! A [`Sample`] binds one config section's volumes to the network's input and output
//! channels and draws aligned patches from them. [`AffinitySample`] and
//! [`BoundarySample`] turn those patches into targets, masks and rebalance weights.

use crate::augment::AugmentFlags;
use crate::config::{OutputType, SampleParams, SampleSection};
use crate::error::{Result, SampleError};
use crate::net::NetworkShapes;
use crate::request_log::RequestLog;
use crate::tensor::{FloatElem, Tensor};
use crate::volume::{
    DevRange, InputProvider, OutputProvider, PatchCount, ProviderFactory, Shape3, Vec3,
};
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

pub mod affinity;
pub mod boundary;
pub mod collection;
pub mod output;

pub use affinity::AffinitySample;
pub use boundary::BoundarySample;
pub use collection::SampleCollection;
pub use output::OutputAccumulator;

/// Patches keyed by network channel name.
pub type NamedPatches<T> = BTreeMap<String, Tensor<T, 4>>;

/// Raw patches of one draw, all taken at the same deviation.
#[derive(Debug, Clone)]
pub struct PatchSet {
    pub inputs: NamedPatches<f32>,
    pub labels: NamedPatches<u32>,
    pub masks: NamedPatches<u8>,
}

impl PatchSet {
    fn spatial_shapes(&self) -> impl Iterator<Item = Shape3> + '_ {
        self.inputs
            .values()
            .map(Tensor::spatial_shape)
            .chain(self.labels.values().map(Tensor::spatial_shape))
            .chain(self.masks.values().map(Tensor::spatial_shape))
    }
}

/// A network-ready training example.
#[derive(Debug, Clone)]
pub struct TrainingPatch<W: FloatElem> {
    pub inputs: NamedPatches<f32>,
    pub targets: NamedPatches<W>,
    pub masks: NamedPatches<W>,
    pub weights: NamedPatches<W>,
}

/// Settings shared by every sample built for one collection.
#[derive(Clone)]
pub struct SampleContext<'a> {
    pub factory: &'a dyn ProviderFactory,
    pub params: &'a SampleParams,
    /// Spatial shape of one network output patch.
    pub outsz: Shape3,
    /// Inference mode: no augmentation and inference tiling of inputs.
    pub forward: bool,
    pub log: Option<RequestLog>,
}

impl std::fmt::Debug for SampleContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleContext")
            .field("params", self.params)
            .field("outsz", &self.outsz)
            .field("forward", &self.forward)
            .finish_non_exhaustive()
    }
}

/// Volumes of one config section, aligned on their centers.
pub struct Sample {
    name: String,
    inputs: BTreeMap<String, Box<dyn InputProvider>>,
    outputs: BTreeMap<String, Box<dyn OutputProvider>>,
    range: DevRange,
    candidates: Vec<Vec3>,
    augment: bool,
    forward: bool,
    log: Option<RequestLog>,
}

impl Sample {
    /// Builds providers for every channel and collects the candidate deviations.
    ///
    /// `inputs` and `outputs` map channel names to the spatial patch shape the providers
    /// cut. Every input channel must be named in the section; output channels the section
    /// does not name are skipped.
    pub fn new(
        section: &SampleSection,
        ctx: &SampleContext<'_>,
        inputs: &BTreeMap<String, Shape3>,
        outputs: &BTreeMap<String, Shape3>,
    ) -> Result<Self> {
        let name = section.name();
        let mut range = DevRange::unbounded();

        let mut input_providers = BTreeMap::new();
        for (channel, &patch) in inputs {
            let id = section
                .volume_id(channel)
                .ok_or_else(|| SampleError::MissingChannel {
                    section: name.clone(),
                    channel: channel.clone(),
                })?;
            let provider = ctx.factory.input_image(id, patch, ctx.outsz, ctx.forward)?;
            range = range.intersect(&provider.dev_range());
            input_providers.insert(channel.clone(), provider);
        }

        let mut output_providers = BTreeMap::new();
        for (channel, &patch) in outputs {
            let Some(id) = section.volume_id(channel) else {
                debug!(section = %name, channel = %channel, "no label volume, skipping output");
                continue;
            };
            let provider = ctx.factory.output_label(id, patch, ctx.outsz)?;
            range = range.intersect(&provider.dev_range());
            output_providers.insert(channel.clone(), provider);
        }

        let candidates = if output_providers.is_empty() {
            warn!(section = %name, "no output volumes, sample cannot be drawn from");
            Vec::new()
        } else if range.is_empty() {
            warn!(section = %name, ?range, "patches do not fit inside the volumes");
            Vec::new()
        } else {
            candidate_deviations(&output_providers, &range)
        };
        info!(
            section = %name,
            inputs = input_providers.len(),
            outputs = output_providers.len(),
            candidates = candidates.len(),
            "sample ready"
        );

        Ok(Self {
            name,
            inputs: input_providers,
            outputs: output_providers,
            range,
            candidates,
            augment: ctx.params.is_data_aug && !ctx.forward,
            forward: ctx.forward,
            log: ctx.log.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deviations valid for every provider.
    pub fn dev_range(&self) -> DevRange {
        self.range
    }

    /// Deviations a random draw chooses from.
    pub fn candidates(&self) -> &[Vec3] {
        &self.candidates
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    /// Full label volumes keyed by output channel.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &Tensor<u32, 4>)> + '_ {
        self.outputs.iter().map(|(k, p)| (k.as_str(), p.label()))
    }

    /// Draws a uniformly random candidate deviation and extracts every patch at it.
    ///
    /// With augmentation on, one set of random flips is applied to all patches.
    ///
    /// # Errors
    ///
    /// `SampleError::NoCandidates` if the sample has no valid location.
    pub fn get_random_sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<PatchSet> {
        if self.candidates.is_empty() {
            return Err(SampleError::NoCandidates {
                section: self.name.clone(),
            });
        }
        let dev = self.candidates[rng.random_range(0..self.candidates.len())];
        debug!(section = %self.name, ?dev, "subvolume requested");
        self.write_request_to_log(dev)?;
        let mut patches = self.patches_at(dev)?;

        if self.augment {
            let flags = AugmentFlags::random(rng).restricted_to(patches.spatial_shapes());
            debug!(section = %self.name, ?flags, "augmenting");
            flags.apply_all(&mut patches.inputs)?;
            flags.apply_all(&mut patches.labels)?;
            flags.apply_all(&mut patches.masks)?;
        }
        Ok(patches)
    }

    /// Extracts every patch at `dev` without augmentation.
    pub fn patches_at(&self, dev: Vec3) -> Result<PatchSet> {
        let mut inputs = BTreeMap::new();
        for (name, provider) in &self.inputs {
            inputs.insert(name.clone(), provider.subvolume(dev)?);
        }
        let mut labels = BTreeMap::new();
        let mut masks = BTreeMap::new();
        for (name, provider) in &self.outputs {
            let (label, mask) = provider.subvolume(dev)?;
            labels.insert(name.clone(), label);
            masks.insert(name.clone(), mask);
        }
        Ok(PatchSet {
            inputs,
            labels,
            masks,
        })
    }

    /// Next patches of the sequential tiling, or `None` once any provider is exhausted.
    pub fn get_next_patch(&mut self) -> Result<Option<PatchSet>> {
        let mut inputs = BTreeMap::new();
        for (name, provider) in &mut self.inputs {
            let Some(patch) = provider.next_patch()? else {
                return Ok(None);
            };
            inputs.insert(name.clone(), patch);
        }
        let mut labels = BTreeMap::new();
        let mut masks = BTreeMap::new();
        for (name, provider) in &mut self.outputs {
            let Some((label, mask)) = provider.next_patch()? else {
                return Ok(None);
            };
            labels.insert(name.clone(), label);
            masks.insert(name.clone(), mask);
        }
        Ok(Some(PatchSet {
            inputs,
            labels,
            masks,
        }))
    }

    /// Extent each input's sequential tiling covers.
    pub fn output_volume_shape(&self) -> BTreeMap<String, Shape3> {
        self.inputs
            .iter()
            .map(|(k, p)| (k.clone(), p.output_volume_shape()))
            .collect()
    }

    pub fn num_patches(&self) -> BTreeMap<String, PatchCount> {
        self.inputs
            .iter()
            .map(|(k, p)| (k.clone(), p.num_patches()))
            .collect()
    }

    fn write_request_to_log(&self, dev: Vec3) -> Result<()> {
        match &self.log {
            Some(log) => log.write_request(&self.name, dev),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sample")
            .field("name", &self.name)
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .field("range", &self.range)
            .field("candidates", &self.candidates.len())
            .finish()
    }
}

/// Rejects parameters whose `dtype` differs from the element type `W` a sample is built for.
pub(crate) fn check_dtype<W: FloatElem>(params: &SampleParams) -> Result<()> {
    if params.dtype != W::DTYPE {
        return Err(SampleError::DTypeMismatch {
            configured: params.dtype.as_str(),
            built: W::DTYPE.as_str(),
        });
    }
    Ok(())
}

/// Deviations at which every output has a valid location.
fn candidate_deviations(
    outputs: &BTreeMap<String, Box<dyn OutputProvider>>,
    range: &DevRange,
) -> Vec<Vec3> {
    let mut providers = outputs.values();
    let Some(first) = providers.next() else {
        return Vec::new();
    };
    let mut devs = deviations(first.as_ref(), range);
    for provider in providers {
        let allowed: HashSet<Vec3> = deviations(provider.as_ref(), range).into_iter().collect();
        devs.retain(|d| allowed.contains(d));
    }
    devs
}

fn deviations(provider: &dyn OutputProvider, range: &DevRange) -> Vec<Vec3> {
    let center = provider.center();
    provider
        .candidate_locations(range)
        .into_iter()
        .map(|loc| [0, 1, 2].map(|i| loc[i] as i64 - center[i]))
        .collect()
}

/// A sample that turns raw patches into training targets.
pub trait TrainingSample<W: FloatElem> {
    fn base(&self) -> &Sample;

    /// Recomputes the stored rebalance weights from the full label volumes.
    fn prepare_weights(&mut self) -> Result<()>;

    fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<TrainingPatch<W>>;
}

/// A sample of either target kind.
#[derive(Debug)]
pub enum AnySample<W: FloatElem> {
    Affinity(AffinitySample<W>),
    Boundary(BoundarySample<W>),
}

impl<W: FloatElem> AnySample<W> {
    pub fn new(
        kind: OutputType,
        section: &SampleSection,
        ctx: &SampleContext<'_>,
        net: &dyn NetworkShapes,
    ) -> Result<Self> {
        Ok(match kind {
            OutputType::Affinity => AnySample::Affinity(AffinitySample::new(section, ctx, net)?),
            OutputType::Boundary => AnySample::Boundary(BoundarySample::new(section, ctx, net)?),
        })
    }
}

impl<W: FloatElem> TrainingSample<W> for AnySample<W> {
    fn base(&self) -> &Sample {
        match self {
            AnySample::Affinity(s) => s.base(),
            AnySample::Boundary(s) => s.base(),
        }
    }

    fn prepare_weights(&mut self) -> Result<()> {
        match self {
            AnySample::Affinity(s) => s.prepare_weights(),
            AnySample::Boundary(s) => s.prepare_weights(),
        }
    }

    fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<TrainingPatch<W>> {
        match self {
            AnySample::Affinity(s) => s.draw(rng),
            AnySample::Boundary(s) => s.draw(rng),
        }
    }
}
