//! Volume geometry and the providers that cut patches out of resident volumes.
//!
//! # Placement rule
//!
//! Every provider places patches the same way. For an axis of length `S` and patch length
//! `p` the volume center is `S / 2`, and a patch at deviation `d` starts at
//! `S/2 + d - p/2`. The patch stays inside the volume for
//!
//! ```text
//! p/2 - S/2  <=  d  <=  S - p + p/2 - S/2
//! ```
//!
//! which is the provider's [`DevRange`]. Volumes of different extents are aligned on their
//! centers, so one deviation addresses the same physical location in all of them.

use serde::{Deserialize, Serialize};

pub mod dataset;
pub mod provider;
pub mod store;

pub use dataset::VolumeDataset;
pub use provider::{InputImage, InputProvider, OutputLabel, OutputProvider, ProviderFactory};
pub use store::VolumeStore;

/// Signed `[dz, dy, dx]` offset from a volume center.
pub type Vec3 = [i64; 3];

/// Unsigned `[z, y, x]` extent or coordinate.
pub type Shape3 = [usize; 3];

/// Center voxel of a volume of the given extent.
pub fn center_of(extent: Shape3) -> Vec3 {
    extent.map(|s| (s / 2) as i64)
}

/// Inclusive range of patch-center deviations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevRange {
    pub low: Vec3,
    pub high: Vec3,
}

impl DevRange {
    pub const fn new(low: Vec3, high: Vec3) -> Self {
        Self { low, high }
    }

    /// The identity of [`DevRange::intersect`].
    pub const fn unbounded() -> Self {
        Self {
            low: [i64::MIN; 3],
            high: [i64::MAX; 3],
        }
    }

    /// Deviations at which a `patch`-sized window stays inside an `extent`-sized volume.
    pub fn for_patch(extent: Shape3, patch: Shape3) -> Self {
        let mut low = [0; 3];
        let mut high = [0; 3];
        for i in 0..3 {
            let (s, p) = (extent[i] as i64, patch[i] as i64);
            low[i] = p / 2 - s / 2;
            high[i] = s - p + p / 2 - s / 2;
        }
        Self { low, high }
    }

    /// Component-wise `max` of lows and `min` of highs.
    pub fn intersect(&self, other: &DevRange) -> DevRange {
        let mut out = *self;
        for i in 0..3 {
            out.low[i] = out.low[i].max(other.low[i]);
            out.high[i] = out.high[i].min(other.high[i]);
        }
        out
    }

    /// `true` when some axis has `low > high`.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.low[i] > self.high[i])
    }

    pub fn contains(&self, dev: Vec3) -> bool {
        (0..3).all(|i| self.low[i] <= dev[i] && dev[i] <= self.high[i])
    }
}

/// Remaining and total patch counts of a sequential tiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchCount {
    pub remaining: usize,
    pub total: usize,
}

/// Deterministic tiling of an extent by fixed-size patches.
///
/// Tiles are laid out with a stride equal to the patch size; on each axis the last tile is
/// moved back to end exactly at the far edge, so the tiling covers the whole extent
/// (neighbouring tiles may overlap there). Positions are visited z-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchGrid {
    starts: [Vec<usize>; 3],
    cursor: usize,
}

impl PatchGrid {
    pub fn new(extent: Shape3, patch: Shape3) -> Self {
        Self {
            starts: [0, 1, 2].map(|i| axis_starts(extent[i], patch[i])),
            cursor: 0,
        }
    }

    /// Total number of tiles.
    pub fn len(&self) -> usize {
        self.starts.iter().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start coordinate of tile `index`.
    pub fn position(&self, index: usize) -> Option<Shape3> {
        if index >= self.len() {
            return None;
        }
        let (ny, nx) = (self.starts[1].len(), self.starts[2].len());
        Some([
            self.starts[0][index / (ny * nx)],
            self.starts[1][(index / nx) % ny],
            self.starts[2][index % nx],
        ])
    }

    /// Returns the tile under the cursor and advances past it.
    pub fn next_position(&mut self) -> Option<Shape3> {
        let pos = self.position(self.cursor)?;
        self.cursor += 1;
        Some(pos)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn count(&self) -> PatchCount {
        let total = self.len();
        PatchCount {
            remaining: total.saturating_sub(self.cursor),
            total,
        }
    }
}

fn axis_starts(extent: usize, patch: usize) -> Vec<usize> {
    if patch == 0 || patch > extent {
        return Vec::new();
    }
    let mut starts: Vec<usize> = (0..=extent - patch).step_by(patch).collect();
    if let Some(&last) = starts.last() {
        if last + patch < extent {
            starts.push(extent - patch);
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_for_patch() {
        // S = 10, p = 4: center 5, start = 5 + d - 2 in [0, 6] => d in [-3, 3]
        let r = DevRange::for_patch([10, 10, 10], [4, 4, 4]);
        assert_eq!(r.low, [-3; 3]);
        assert_eq!(r.high, [3; 3]);

        // Odd sizes: S = 9, p = 3: center 4, start = 4 + d - 1 in [0, 6] => d in [-3, 3]
        let r = DevRange::for_patch([9, 9, 9], [3, 3, 3]);
        assert_eq!(r.low, [-3; 3]);
        assert_eq!(r.high, [3; 3]);

        // Full-size patch has exactly one placement.
        let r = DevRange::for_patch([5, 6, 7], [5, 6, 7]);
        assert_eq!(r.low, r.high);
        assert!(!r.is_empty());
    }

    #[test]
    fn test_patch_larger_than_volume_is_empty() {
        let r = DevRange::for_patch([4, 10, 10], [5, 3, 3]);
        assert!(r.is_empty());
    }

    #[test]
    fn test_intersect_is_componentwise() {
        let a = DevRange::new([-3, -1, 0], [3, 5, 2]);
        let b = DevRange::new([-2, -4, 1], [4, 1, 9]);
        let c = a.intersect(&b);
        assert_eq!(c.low, [-2, -1, 1]);
        assert_eq!(c.high, [3, 1, 2]);
        assert_eq!(DevRange::unbounded().intersect(&a), a);

        let disjoint = a.intersect(&DevRange::new([4, 0, 0], [6, 0, 0]));
        assert!(disjoint.is_empty());
    }

    #[test]
    fn test_contains() {
        let r = DevRange::new([-1, -1, -1], [1, 1, 1]);
        assert!(r.contains([0, 1, -1]));
        assert!(!r.contains([0, 2, 0]));
    }

    #[test]
    fn test_grid_covers_extent() {
        assert_eq!(axis_starts(10, 4), vec![0, 4, 6]);
        assert_eq!(axis_starts(8, 4), vec![0, 4]);
        assert_eq!(axis_starts(3, 4), Vec::<usize>::new());
        assert_eq!(axis_starts(5, 0), Vec::<usize>::new());
    }

    #[test]
    fn test_grid_iteration_order() {
        let mut grid = PatchGrid::new([2, 4, 4], [2, 2, 2]);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.count(), PatchCount { remaining: 4, total: 4 });

        let positions: Vec<_> = std::iter::from_fn(|| grid.next_position()).collect();
        assert_eq!(
            positions,
            vec![[0, 0, 0], [0, 0, 2], [0, 2, 0], [0, 2, 2]]
        );
        assert_eq!(grid.count().remaining, 0);
        assert_eq!(grid.next_position(), None);

        grid.reset();
        assert_eq!(grid.next_position(), Some([0, 0, 0]));
    }
}
