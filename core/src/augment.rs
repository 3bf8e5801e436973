//! Random flips and the Y/X transpose, applied identically to every patch of a draw.

use crate::error::Result;
use crate::tensor::{Tensor, TensorElem};
use crate::volume::Shape3;
use rand::Rng;
use std::collections::BTreeMap;

/// One draw of the augmentation choices. Each flag is set with probability one half.
///
/// Flips are applied first (z, y, then x), followed by the Y/X transpose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AugmentFlags {
    pub flip_z: bool,
    pub flip_y: bool,
    pub flip_x: bool,
    pub transpose_yx: bool,
}

impl AugmentFlags {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            flip_z: rng.random_bool(0.5),
            flip_y: rng.random_bool(0.5),
            flip_x: rng.random_bool(0.5),
            transpose_yx: rng.random_bool(0.5),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Clears the transpose unless every patch has `Y == X`.
    pub fn restricted_to<I>(mut self, spatial_shapes: I) -> Self
    where
        I: IntoIterator<Item = Shape3>,
    {
        if spatial_shapes.into_iter().any(|[_, y, x]| y != x) {
            self.transpose_yx = false;
        }
        self
    }

    pub fn apply<T: TensorElem>(&self, patch: &Tensor<T, 4>) -> Result<Tensor<T, 4>> {
        let mut out = patch.clone();
        for (flip, axis) in [(self.flip_z, 1), (self.flip_y, 2), (self.flip_x, 3)] {
            if flip {
                out = out.flip(axis)?;
            }
        }
        if self.transpose_yx {
            out = out.transpose()?;
        }
        Ok(out)
    }

    /// Applies the flags to every patch of a named collection in place.
    pub fn apply_all<T: TensorElem>(
        &self,
        patches: &mut BTreeMap<String, Tensor<T, 4>>,
    ) -> Result<()> {
        if self.is_identity() {
            return Ok(());
        }
        for patch in patches.values_mut() {
            *patch = self.apply(patch)?;
        }
        Ok(())
    }
}
