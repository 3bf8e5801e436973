use super::{check_dtype, PatchSet, Sample, SampleContext, TrainingPatch, TrainingSample};
use crate::config::SampleSection;
use crate::error::{Result, SampleError};
use crate::net::{spatial_shapes, NetworkShapes};
use crate::rebalance::{balance_weights, weight_map, BalanceNorm, BalanceWeights, Rebalance};
use crate::tensor::FloatElem;
use crate::transform::binary_class;
use rand::Rng;
use std::collections::BTreeMap;

/// Sample producing two-channel foreground/background targets.
///
/// Masks and weights are single-channel maps tiled to the number of target channels.
#[derive(Debug)]
pub struct BoundarySample<W: FloatElem> {
    base: Sample,
    rebalance: Rebalance,
    norm: BalanceNorm,
    weights: BTreeMap<String, BalanceWeights<W>>,
}

impl<W: FloatElem> BoundarySample<W> {
    pub fn new(
        section: &SampleSection,
        ctx: &SampleContext<'_>,
        net: &dyn NetworkShapes,
    ) -> Result<Self> {
        check_dtype::<W>(ctx.params)?;
        let inputs = spatial_shapes(net.inputs_setsz(), 0);
        let outputs = spatial_shapes(net.outputs_setsz(), 0);

        let mut sample = Self {
            base: Sample::new(section, ctx, &inputs, &outputs)?,
            rebalance: ctx.params.rebalance(),
            norm: ctx.params.rebalance_norm,
            weights: BTreeMap::new(),
        };
        sample.prepare_weights()?;
        Ok(sample)
    }

    /// Current weights of output `name`.
    pub fn weights(&self, name: &str) -> BalanceWeights<W> {
        self.weights.get(name).copied().unwrap_or_default()
    }
}

impl<W: FloatElem> TrainingSample<W> for BoundarySample<W> {
    fn base(&self) -> &Sample {
        &self.base
    }

    fn prepare_weights(&mut self) -> Result<()> {
        self.weights = match self.rebalance {
            Rebalance::Global => self
                .base
                .labels()
                .map(|(name, label)| (name.to_string(), balance_weights(label.data(), self.norm)))
                .collect(),
            Rebalance::Off | Rebalance::Patch => BTreeMap::new(),
        };
        Ok(())
    }

    fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<TrainingPatch<W>> {
        let PatchSet {
            inputs,
            labels,
            masks,
        } = self.base.get_random_sample(rng)?;

        if self.rebalance == Rebalance::Patch {
            let norm = self.norm;
            self.weights = labels
                .iter()
                .map(|(name, label)| (name.clone(), balance_weights(label.data(), norm)))
                .collect();
        }

        let mut targets = BTreeMap::new();
        let mut out_masks = BTreeMap::new();
        let mut weights = BTreeMap::new();
        for (name, label) in &labels {
            let target = binary_class::<W>(label)?;
            let channels = target.channels();
            let mask = masks
                .get(name)
                .ok_or_else(|| SampleError::UnknownChannel(name.clone()))?
                .cast::<W>()?;

            out_masks.insert(name.clone(), mask.repeat_leading(channels));
            weights.insert(
                name.clone(),
                weight_map(label, &self.weights(name)).repeat_leading(channels),
            );
            targets.insert(name.clone(), target);
        }

        Ok(TrainingPatch {
            inputs,
            targets,
            masks: out_masks,
            weights,
        })
    }
}
