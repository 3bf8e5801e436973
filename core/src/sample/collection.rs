use super::{AnySample, SampleContext, TrainingPatch, TrainingSample};
use crate::config::{OutputType, SamplerConfig};
use crate::error::{Result, SampleError};
use crate::net::NetworkShapes;
use crate::request_log::RequestLog;
use crate::tensor::FloatElem;
use crate::volume::{ProviderFactory, Shape3};
use rand::Rng;
use tracing::{info, warn};

/// All samples of a config, drawn from uniformly.
#[derive(Debug)]
pub struct SampleCollection<W: FloatElem> {
    kind: OutputType,
    samples: Vec<AnySample<W>>,
}

impl<W: FloatElem> SampleCollection<W> {
    /// Builds one training sample per `[[sample]]` section.
    ///
    /// # Errors
    ///
    /// `SampleError::InvalidOutputType` if `out_type` names no known target, and
    /// `SampleError::DTypeMismatch` if `dtype` is not `W`. Errors building any sample
    /// are returned as is.
    pub fn new(
        config: &SamplerConfig,
        factory: &dyn ProviderFactory,
        net: &dyn NetworkShapes,
        outsz: Shape3,
        log: Option<RequestLog>,
    ) -> Result<Self> {
        let params = &config.params;
        let kind = params.output_type()?;
        if params.is_rebalance && params.is_patch_rebalance {
            warn!("both is_rebalance and is_patch_rebalance set, rebalancing per patch");
        }

        let ctx = SampleContext {
            factory,
            params,
            outsz,
            forward: false,
            log,
        };
        let samples = config
            .samples
            .iter()
            .map(|section| AnySample::new(kind, section, &ctx, net))
            .collect::<Result<Vec<_>>>()?;
        info!(?kind, samples = samples.len(), dtype = W::DTYPE.as_str(), "sample collection ready");
        Ok(Self { kind, samples })
    }

    /// Like [`new`](Self::new), with the network shapes taken from the config.
    pub fn from_config(
        config: &SamplerConfig,
        factory: &dyn ProviderFactory,
        outsz: Shape3,
        log: Option<RequestLog>,
    ) -> Result<Self> {
        let net = config.network.as_ref().ok_or(SampleError::MissingNetwork)?;
        Self::new(config, factory, net, outsz, log)
    }

    /// Picks a sample uniformly at random and draws a training patch from it.
    pub fn get_random_sample<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<TrainingPatch<W>> {
        if self.samples.is_empty() {
            return Err(SampleError::EmptyCollection);
        }
        let i = rng.random_range(0..self.samples.len());
        self.samples[i].draw(rng)
    }

    pub fn kind(&self) -> OutputType {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[AnySample<W>] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [AnySample<W>] {
        &mut self.samples
    }
}
