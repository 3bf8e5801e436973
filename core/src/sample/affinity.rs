use super::{
    check_dtype, NamedPatches, PatchSet, Sample, SampleContext, TrainingPatch, TrainingSample,
};
use crate::config::SampleSection;
use crate::error::Result;
use crate::net::{spatial_shapes, NetworkShapes};
use crate::rebalance::{
    affinity_weight_map, affinity_weights, BalanceNorm, BalanceWeights, Rebalance,
};
use crate::tensor::FloatElem;
use crate::transform::{
    crop_leading_edge, mask_to_affinity_mask, seg_to_affinity, AffinityMaskRule,
};
use rand::Rng;
use std::collections::BTreeMap;

/// Sample producing three-channel affinity targets.
///
/// In training mode every patch is read one voxel larger per axis than the network
/// shape, since an affinity map is one voxel smaller than its segmentation. Inputs are
/// trimmed back on the leading edge so they align with the edge grid.
#[derive(Debug)]
pub struct AffinitySample<W: FloatElem> {
    base: Sample,
    rebalance: Rebalance,
    norm: BalanceNorm,
    mask_rule: AffinityMaskRule,
    inflated: bool,
    weights: BTreeMap<String, [BalanceWeights<W>; 3]>,
}

impl<W: FloatElem> AffinitySample<W> {
    pub fn new(
        section: &SampleSection,
        ctx: &SampleContext<'_>,
        net: &dyn NetworkShapes,
    ) -> Result<Self> {
        check_dtype::<W>(ctx.params)?;
        let grow = usize::from(!ctx.forward);
        let inputs = spatial_shapes(net.inputs_setsz(), grow);
        let outputs = spatial_shapes(net.outputs_setsz(), grow);

        let mut sample = Self {
            base: Sample::new(section, ctx, &inputs, &outputs)?,
            rebalance: ctx.params.rebalance(),
            norm: ctx.params.rebalance_norm,
            mask_rule: ctx.params.affinity_mask_rule,
            inflated: grow > 0,
            weights: BTreeMap::new(),
        };
        sample.prepare_weights()?;
        Ok(sample)
    }

    /// Current per-channel weights of output `name`.
    pub fn weights(&self, name: &str) -> [BalanceWeights<W>; 3] {
        self.weights
            .get(name)
            .copied()
            .unwrap_or([BalanceWeights::unit(); 3])
    }

    fn weights_from(
        &self,
        targets: &NamedPatches<W>,
    ) -> Result<BTreeMap<String, [BalanceWeights<W>; 3]>> {
        targets
            .iter()
            .map(|(name, aff)| Ok((name.clone(), affinity_weights(aff, self.norm)?)))
            .collect()
    }
}

impl<W: FloatElem> TrainingSample<W> for AffinitySample<W> {
    fn base(&self) -> &Sample {
        &self.base
    }

    fn prepare_weights(&mut self) -> Result<()> {
        self.weights = match self.rebalance {
            Rebalance::Global => {
                let mut targets = BTreeMap::new();
                for (name, label) in self.base.labels() {
                    targets.insert(name.to_string(), seg_to_affinity::<W>(label)?);
                }
                self.weights_from(&targets)?
            }
            Rebalance::Off | Rebalance::Patch => BTreeMap::new(),
        };
        Ok(())
    }

    fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<TrainingPatch<W>> {
        let PatchSet {
            mut inputs,
            labels,
            masks,
        } = self.base.get_random_sample(rng)?;

        if self.inflated {
            for input in inputs.values_mut() {
                *input = crop_leading_edge(input)?;
            }
        }

        let mut targets = BTreeMap::new();
        for (name, label) in &labels {
            targets.insert(name.clone(), seg_to_affinity::<W>(label)?);
        }
        let mut edge_masks = BTreeMap::new();
        for (name, mask) in &masks {
            edge_masks.insert(name.clone(), mask_to_affinity_mask::<W>(mask, self.mask_rule)?);
        }

        if self.rebalance == Rebalance::Patch {
            self.weights = self.weights_from(&targets)?;
        }
        let mut weights = BTreeMap::new();
        for (name, aff) in &targets {
            weights.insert(name.clone(), affinity_weight_map(aff, &self.weights(name))?);
        }

        Ok(TrainingPatch {
            inputs,
            targets,
            masks: edge_masks,
            weights,
        })
    }
}
