//! TOML configuration for samplers.
//!
//! ```toml
//! [params]
//! out_type = "affinity"
//! is_data_aug = true
//! is_rebalance = true
//! dtype = "float32"
//!
//! [network]
//! inputs = { input = [1, 9, 65, 65] }
//! outputs = { label = [3, 1, 1, 1] }
//!
//! [[sample]]
//! id = 1
//! channels = { input = 1, label = 1 }
//! ```

use crate::error::{Result, SampleError};
use crate::net::PatchShapes;
use crate::rebalance::{BalanceNorm, Rebalance};
use crate::tensor::DType;
use crate::transform::AffinityMaskRule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Kind of training target a collection produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Boundary,
    Affinity,
}

impl OutputType {
    /// Matches on substrings: anything containing `"bound"` is a boundary target, anything
    /// else containing `"aff"` an affinity target.
    ///
    /// # Errors
    ///
    /// `SampleError::InvalidOutputType` otherwise.
    pub fn parse(out_type: &str) -> Result<Self> {
        if out_type.contains("bound") {
            Ok(OutputType::Boundary)
        } else if out_type.contains("aff") {
            Ok(OutputType::Affinity)
        } else {
            Err(SampleError::InvalidOutputType(out_type.to_string()))
        }
    }
}

/// Sampling parameters shared by every sample of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleParams {
    pub out_type: String,
    #[serde(default)]
    pub is_data_aug: bool,
    #[serde(default)]
    pub is_rebalance: bool,
    #[serde(default)]
    pub is_patch_rebalance: bool,
    #[serde(default)]
    pub dtype: DType,
    #[serde(default)]
    pub rebalance_norm: BalanceNorm,
    #[serde(default)]
    pub affinity_mask_rule: AffinityMaskRule,
}

impl SampleParams {
    /// Parameters with augmentation and rebalancing off.
    pub fn new(out_type: impl Into<String>) -> Self {
        Self {
            out_type: out_type.into(),
            is_data_aug: false,
            is_rebalance: false,
            is_patch_rebalance: false,
            dtype: DType::default(),
            rebalance_norm: BalanceNorm::default(),
            affinity_mask_rule: AffinityMaskRule::default(),
        }
    }

    pub fn output_type(&self) -> Result<OutputType> {
        OutputType::parse(&self.out_type)
    }

    pub fn rebalance(&self) -> Rebalance {
        Rebalance::from_flags(self.is_rebalance, self.is_patch_rebalance)
    }
}

/// One `[[sample]]` entry: a numbered section mapping channel names to volume ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSection {
    pub id: u32,
    #[serde(default)]
    pub channels: BTreeMap<String, u32>,
}

impl SampleSection {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            channels: BTreeMap::new(),
        }
    }

    pub fn with_channel(mut self, name: impl Into<String>, volume: u32) -> Self {
        self.channels.insert(name.into(), volume);
        self
    }

    /// `sample{id}`, as written to the request log.
    pub fn name(&self) -> String {
        format!("sample{}", self.id)
    }

    pub fn volume_id(&self, channel: &str) -> Option<u32> {
        self.channels.get(channel).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub params: SampleParams,
    #[serde(default)]
    pub network: Option<PatchShapes>,
    #[serde(default, rename = "sample")]
    pub samples: Vec<SampleSection>,
}

impl SamplerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SampleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            samples = config.samples.len(),
            "Loaded sampler config"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_type_substrings() {
        assert_eq!(OutputType::parse("boundary").unwrap(), OutputType::Boundary);
        assert_eq!(OutputType::parse("affinity").unwrap(), OutputType::Affinity);
        assert_eq!(OutputType::parse("aff").unwrap(), OutputType::Affinity);
        // "bound" is checked first
        assert_eq!(OutputType::parse("bound_aff").unwrap(), OutputType::Boundary);
        assert!(matches!(
            OutputType::parse("semantic"),
            Err(SampleError::InvalidOutputType(_))
        ));
    }

    #[test]
    fn test_deserialize_full_config() {
        let config = SamplerConfig::from_toml_str(
            r#"
[params]
out_type = "affinity"
is_data_aug = true
is_patch_rebalance = true
dtype = "float64"
rebalance_norm = "znn_v1"
affinity_mask_rule = "both_endpoints"

[network]
inputs = { input = [1, 5, 9, 9] }
outputs = { label = [3, 1, 5, 5] }

[[sample]]
id = 1
channels = { input = 1, label = 1 }

[[sample]]
id = 2
channels = { input = 2, label = 2 }
"#,
        )
        .unwrap();
        assert!(config.params.is_data_aug);
        assert_eq!(config.params.dtype, DType::Float64);
        assert_eq!(config.params.rebalance(), Rebalance::Patch);
        assert_eq!(config.params.rebalance_norm, BalanceNorm::ZnnV1);
        assert_eq!(
            config.params.affinity_mask_rule,
            AffinityMaskRule::BothEndpoints
        );
        let ids: Vec<u32> = config.samples.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(config.samples[1].name(), "sample2");
        assert_eq!(config.samples[0].volume_id("label"), Some(1));
        let net = config.network.unwrap();
        assert_eq!(net.outputs["label"], [3, 1, 5, 5]);
    }

    #[test]
    fn test_defaults() {
        let config = SamplerConfig::from_toml_str("[params]\nout_type = \"boundary\"\n").unwrap();
        assert_eq!(config.params, SampleParams::new("boundary"));
        assert_eq!(config.params.rebalance(), Rebalance::Off);
        assert!(config.network.is_none());
        assert!(config.samples.is_empty());
    }

    #[test]
    fn test_missing_out_type_is_an_error() {
        assert!(matches!(
            SamplerConfig::from_toml_str("[params]\nis_data_aug = true\n"),
            Err(SampleError::Config(_))
        ));
    }
}
