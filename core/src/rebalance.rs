//! Class-rebalance weights.
//!
//! A binary target with `n` voxels of which `p` are positive and `z` non-positive gets a
//! positive weight `wp` and a negative weight `wz`. With [`BalanceNorm::Half`] each class
//! carries half the total mass, `wp = n / (2p)` and `wz = n / (2z)`, so
//! `wp * p + wz * z == n`. A target that is entirely one class gets unit weights.

use crate::error::{Result, SampleError};
use crate::tensor::{FloatElem, Tensor, TensorElem};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Weights applied to positive and non-positive voxels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceWeights<W> {
    pub positive: W,
    pub negative: W,
}

impl<W: FloatElem> BalanceWeights<W> {
    pub fn unit() -> Self {
        Self {
            positive: W::one(),
            negative: W::one(),
        }
    }

    pub fn select(&self, positive: bool) -> W {
        if positive {
            self.positive
        } else {
            self.negative
        }
    }
}

impl<W: FloatElem> Default for BalanceWeights<W> {
    fn default() -> Self {
        Self::unit()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceNorm {
    /// Each class carries half of the total weight.
    #[default]
    Half,
    /// `wp = (1/p) / (1/p + 1/z)`, `wz = (1/z) / (1/p + 1/z)`: weights sum to one.
    ZnnV1,
}

/// When weights are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebalance {
    /// Every weight is one.
    Off,
    /// Once, from the full label volume.
    Global,
    /// Again for every drawn patch.
    Patch,
}

impl Rebalance {
    /// The per-patch flag wins when both are set.
    pub fn from_flags(is_rebalance: bool, is_patch_rebalance: bool) -> Self {
        match (is_rebalance, is_patch_rebalance) {
            (_, true) => Rebalance::Patch,
            (true, false) => Rebalance::Global,
            (false, false) => Rebalance::Off,
        }
    }
}

fn to_weight<W: FloatElem>(v: f64) -> W {
    W::from_f64(v).unwrap_or_else(W::one)
}

/// Weights balancing the positive (`> 0`) and non-positive elements of `values`.
pub fn balance_weights<T, W>(values: &[T], norm: BalanceNorm) -> BalanceWeights<W>
where
    T: TensorElem,
    W: FloatElem,
{
    let total = values.len();
    let positive = values.par_iter().filter(|v| **v > T::zero()).count();
    let negative = total - positive;
    if positive == 0 || negative == 0 {
        return BalanceWeights::unit();
    }

    let (n, p, z) = (total as f64, positive as f64, negative as f64);
    let (wp, wz) = match norm {
        BalanceNorm::Half => (0.5 * n / p, 0.5 * n / z),
        BalanceNorm::ZnnV1 => {
            let sum = 1.0 / p + 1.0 / z;
            ((1.0 / p) / sum, (1.0 / z) / sum)
        }
    };
    BalanceWeights {
        positive: to_weight(wp),
        negative: to_weight(wz),
    }
}

/// Per-voxel weight map of a single-class target.
pub fn weight_map<T, W>(values: &Tensor<T, 4>, weights: &BalanceWeights<W>) -> Tensor<W, 4>
where
    T: TensorElem,
    W: FloatElem,
{
    let weights = *weights;
    values.map_into(move |v| weights.select(v > T::zero()))
}

fn require_affinity<W: FloatElem>(aff: &Tensor<W, 4>) -> Result<()> {
    if aff.channels() != 3 {
        return Err(SampleError::ShapeViolation(format!(
            "affinity map must have 3 channels, got {:?}",
            aff.shape()
        )));
    }
    Ok(())
}

/// Independent weights for the z, y and x affinity channels.
///
/// # Errors
///
/// `SampleError::ShapeViolation` unless `aff` has exactly three channels.
pub fn affinity_weights<W: FloatElem>(
    aff: &Tensor<W, 4>,
    norm: BalanceNorm,
) -> Result<[BalanceWeights<W>; 3]> {
    require_affinity(aff)?;
    Ok([
        balance_weights(aff.channel(0)?, norm),
        balance_weights(aff.channel(1)?, norm),
        balance_weights(aff.channel(2)?, norm),
    ])
}

/// Weight map of an affinity target using each channel's own weights.
///
/// # Errors
///
/// `SampleError::ShapeViolation` unless `aff` has exactly three channels.
pub fn affinity_weight_map<W: FloatElem>(
    aff: &Tensor<W, 4>,
    weights: &[BalanceWeights<W>; 3],
) -> Result<Tensor<W, 4>> {
    require_affinity(aff)?;
    let plane = aff.strides()[0];
    let data: Vec<W> = aff
        .data()
        .par_iter()
        .enumerate()
        .map(|(i, v)| weights[i / plane].select(*v > W::zero()))
        .collect();
    Ok(Tensor::from_parts(data, *aff.shape()))
}
