//! Label-to-target transforms.
//!
//! Affinity targets are defined on the edges of the voxel grid. A `[1, Z, Y, X]`
//! segmentation produces a `[3, Z-1, Y-1, X-1]` affinity map whose channel `c` holds the
//! edge between voxel `(z+1, y+1, x+1)` and its neighbour one step back along axis `c`
//! (z, y, x). This is why affinity samples read patches one voxel larger than the network
//! output.

use crate::error::{Result, SampleError};
use crate::tensor::{FloatElem, Tensor, TensorElem, TensorError};
use serde::{Deserialize, Serialize};
use zsample_kernels::{cpu_affinity, cpu_edge_map};

/// How a voxel mask becomes an affinity-edge mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffinityMaskRule {
    /// An edge is valid when either voxel is masked in.
    #[default]
    EitherEndpoint,
    /// An edge is valid when both of its voxels are masked in.
    BothEndpoints,
}

fn require_single_channel<T: TensorElem>(
    op: &str,
    t: &Tensor<T, 4>,
) -> Result<()> {
    if t.channels() != 1 {
        return Err(SampleError::ShapeViolation(format!(
            "{op} expects a [1, Z, Y, X] volume, got {:?}",
            t.shape()
        )));
    }
    Ok(())
}

fn edge_shape(spatial: [usize; 3]) -> [usize; 4] {
    let [z, y, x] = spatial;
    [3, z.saturating_sub(1), y.saturating_sub(1), x.saturating_sub(1)]
}

/// Affinity graph of a segmentation: `1` where both voxels of an edge carry the same
/// non-zero id.
///
/// An empty label yields an empty result.
///
/// # Errors
///
/// `SampleError::ShapeViolation` if the label has more than one channel.
pub fn seg_to_affinity<W: FloatElem>(label: &Tensor<u32, 4>) -> Result<Tensor<W, 4>> {
    if label.is_empty() {
        return Ok(Tensor::zeros(edge_shape(label.spatial_shape())));
    }
    require_single_channel("seg_to_affinity", label)?;
    let spatial = label.spatial_shape();
    let edges = cpu_affinity(label.data(), &spatial).map_err(TensorError::from)?;
    let edges = Tensor::from_parts(edges, edge_shape(spatial));
    Ok(edges.map_into(|e| if e > 0 { W::one() } else { W::zero() }))
}

/// Edge mask of a voxel mask.
///
/// # Errors
///
/// `SampleError::ShapeViolation` if the mask has more than one channel.
pub fn mask_to_affinity_mask<W: FloatElem>(
    mask: &Tensor<u8, 4>,
    rule: AffinityMaskRule,
) -> Result<Tensor<W, 4>> {
    if mask.is_empty() {
        return Ok(Tensor::zeros(edge_shape(mask.spatial_shape())));
    }
    require_single_channel("mask_to_affinity_mask", mask)?;
    let spatial = mask.spatial_shape();
    let edges = match rule {
        AffinityMaskRule::EitherEndpoint => {
            cpu_edge_map(mask.data(), &spatial, |a, b| a > 0 || b > 0)
        }
        AffinityMaskRule::BothEndpoints => {
            cpu_edge_map(mask.data(), &spatial, |a, b| a > 0 && b > 0)
        }
    }
    .map_err(TensorError::from)?;
    let edges = Tensor::from_parts(edges, edge_shape(spatial));
    Ok(edges.map_into(|e| if e > 0 { W::one() } else { W::zero() }))
}

/// Two-channel foreground/background encoding of a label.
///
/// Channel 0 is `1` where the label is non-zero, channel 1 is its complement.
///
/// # Errors
///
/// `SampleError::ShapeViolation` if the label has more than one channel.
pub fn binary_class<W: FloatElem>(label: &Tensor<u32, 4>) -> Result<Tensor<W, 4>> {
    require_single_channel("binary_class", label)?;
    let foreground = label.map_into(|v| if v > 0 { W::one() } else { W::zero() });
    let background = foreground.map(|v| W::one() - v);

    let [_, z, y, x] = *label.shape();
    let mut data = foreground.into_data();
    data.extend_from_slice(background.data());
    Ok(Tensor::from_parts(data, [2, z, y, x]))
}

/// Drops the first plane on every spatial axis.
///
/// An affinity sample reads inputs one voxel larger than the network expects; this trims
/// them back so they line up with the `[.., Z-1, Y-1, X-1]` edge grid.
pub fn crop_leading_edge<T: TensorElem>(t: &Tensor<T, 4>) -> Result<Tensor<T, 4>> {
    let [c, z, y, x] = *t.shape();
    if z == 0 || y == 0 || x == 0 {
        return Ok(t.clone());
    }
    Ok(t.crop([0, 1, 1, 1], [c, z - 1, y - 1, x - 1])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affinity_of_two_segments() {
        // 1 x 2 x 2 x 2: z=0 plane is segment 1, z=1 plane is [1, 1; 2, 0]
        let label = Tensor::new(vec![1, 1, 1, 1, 1, 1, 2, 0], [1, 2, 2, 2]).unwrap();
        let aff = seg_to_affinity::<f32>(&label).unwrap();
        assert_eq!(aff.shape(), &[3, 1, 1, 1]);
        // voxel (1,1,1) is background: every edge is 0
        assert_eq!(aff.data(), &[0.0, 0.0, 0.0]);

        let label = Tensor::new(vec![1, 1, 1, 1, 1, 1, 2, 1], [1, 2, 2, 2]).unwrap();
        let aff = seg_to_affinity::<f64>(&label).unwrap();
        // z: (1,1,1)=1 vs (0,1,1)=1; y: vs (1,0,1)=1; x: vs (1,1,0)=2
        assert_eq!(aff.data(), &[1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_affinity_of_empty_label() {
        let label = Tensor::<u32, 4>::zeros([1, 0, 4, 4]);
        let aff = seg_to_affinity::<f32>(&label).unwrap();
        assert!(aff.is_empty());
        assert_eq!(aff.shape(), &[3, 0, 3, 3]);
    }

    #[test]
    fn test_affinity_rejects_multichannel() {
        let label = Tensor::<u32, 4>::ones([2, 2, 2, 2]);
        assert!(matches!(
            seg_to_affinity::<f32>(&label),
            Err(SampleError::ShapeViolation(_))
        ));
        assert!(binary_class::<f32>(&label).is_err());
    }

    #[test]
    fn test_mask_rules() {
        // x-axis pair inside a 1x2x2x2 volume: only voxel (1,1,0) is masked out.
        let mask = Tensor::new(vec![1, 1, 1, 1, 1, 1, 0, 1], [1, 2, 2, 2]).unwrap();
        let both = mask_to_affinity_mask::<f32>(&mask, AffinityMaskRule::BothEndpoints).unwrap();
        let either =
            mask_to_affinity_mask::<f32>(&mask, AffinityMaskRule::EitherEndpoint).unwrap();
        assert_eq!(both.data(), &[1.0, 1.0, 0.0]);
        assert_eq!(either.data(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_default_rule_accepts_one_valid_endpoint() {
        // only voxel (1,1,1) is valid; each of its three edges has one valid endpoint
        let mask = Tensor::new(vec![0, 0, 0, 0, 0, 0, 0, 1], [1, 2, 2, 2]).unwrap();
        let rule = crate::config::SampleParams::new("affinity").affinity_mask_rule;
        assert_eq!(rule, AffinityMaskRule::EitherEndpoint);
        let edges = mask_to_affinity_mask::<f32>(&mask, rule).unwrap();
        assert_eq!(edges.data(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_binary_class_complement() {
        let label = Tensor::new(vec![0, 3, 0, 7], [1, 1, 2, 2]).unwrap();
        let bin = binary_class::<f32>(&label).unwrap();
        assert_eq!(bin.shape(), &[2, 1, 2, 2]);
        assert_eq!(bin.channel(0).unwrap(), &[0.0, 1.0, 0.0, 1.0]);
        assert_eq!(bin.channel(1).unwrap(), &[1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_crop_leading_edge() {
        let t = Tensor::<f32, 4>::new((0..27).map(|v| v as f32).collect(), [1, 3, 3, 3]).unwrap();
        let c = crop_leading_edge(&t).unwrap();
        assert_eq!(c.shape(), &[1, 2, 2, 2]);
        assert_eq!(c.data()[0], 13.0);
    }
}
