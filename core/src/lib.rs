//! # zsample
//!
//! `zsample` draws training patches from 3-D image volumes for voxel-wise segmentation
//! networks. A sampler config lists numbered sample sections, each naming an image volume
//! per network input and a label volume (with an optional validity mask) per network
//! output. A draw picks a section, picks a location valid for every volume in it, cuts
//! aligned patches, optionally flips or transposes them, and converts labels into
//! targets with masks and class-rebalance weights.
//!
//! ## Modules
//!
//! - [`mod@tensor`]: Dense `[C, Z, Y, X]` volumes.
//! - [`volume`]: Patch placement, providers and the in-memory [`VolumeStore`].
//! - [`transform`]: Affinity, edge-mask and binary-class targets.
//! - [`rebalance`]: Class-balancing weights.
//! - [`augment`]: Random flips and the Y/X transpose.
//! - [`sample`]: Samples, the [`SampleCollection`] and the [`OutputAccumulator`].
//! - [`config`]: TOML sampler configuration.
//!
//! ## Example
//!
//! ```rust
//! use rand::SeedableRng;
//! use zsample::{PatchShapes, SampleCollection, SamplerConfig, Tensor, VolumeStore};
//!
//! let config = SamplerConfig::from_toml_str(r#"
//! [params]
//! out_type = "boundary"
//!
//! [[sample]]
//! id = 1
//! channels = { input = 1, label = 1 }
//! "#).unwrap();
//!
//! let mut store = VolumeStore::new();
//! store.insert_image(1, Tensor::zeros([1, 8, 8, 8]));
//! store.insert_label(1, Tensor::ones([1, 8, 8, 8]), None).unwrap();
//!
//! let net = PatchShapes::new()
//!     .with_input("input", [1, 4, 4, 4])
//!     .with_output("label", [2, 4, 4, 4]);
//! let mut samples =
//!     SampleCollection::<f32>::new(&config, &store, &net, [4, 4, 4], None).unwrap();
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let patch = samples.get_random_sample(&mut rng).unwrap();
//! assert_eq!(patch.targets["label"].shape(), &[2, 4, 4, 4]);
//! ```

/// Macro for creating a Tensor with compile-time shape checking.
///
/// # Examples
///
/// ```rust
/// use zsample::tensor;
/// use zsample::tensor::Tensor;
///
/// // Works
/// let t: Tensor<u32, 4> = tensor!([1, 1, 0, 2], [1, 1, 2, 2]);
///
/// // Fails to compile:
/// // let t: Tensor<u32, 4> = tensor!([1, 1, 0], [1, 1, 2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($data:expr, $shape:expr) => {{
        const DATA_LEN: usize = (&$data as &[_]).len();
        const SHAPE: [usize; (&$shape as &[_]).len()] = $shape;
        const EXPECTED_SIZE: usize = {
            let mut size = 1;
            let mut i = 0;
            while i < (&SHAPE as &[_]).len() {
                size *= SHAPE[i];
                i += 1;
            }
            size
        };

        const _: () = assert!(
            DATA_LEN == EXPECTED_SIZE,
            "Shape mismatch: data length does not match shape product"
        );

        // Safe to unwrap because we checked at compile time
        $crate::tensor::Tensor::new($data.to_vec(), $shape).unwrap()
    }};
}

pub mod augment;
pub mod config;
pub mod error;
pub mod net;
pub mod rebalance;
pub mod request_log;
pub mod sample;
pub mod tensor;
pub mod transform;
pub mod volume;

pub use augment::AugmentFlags;
pub use config::{OutputType, SampleParams, SampleSection, SamplerConfig};
pub use error::{Result, SampleError};
pub use net::{NetworkShapes, PatchShapes};
pub use rebalance::{BalanceNorm, BalanceWeights, Rebalance};
pub use request_log::RequestLog;
pub use sample::{
    AffinitySample, AnySample, BoundarySample, NamedPatches, OutputAccumulator, PatchSet,
    Sample, SampleCollection, SampleContext, TrainingPatch, TrainingSample,
};
pub use tensor::{Cpu, DType, Device, FloatElem, Storage, Tensor, TensorElem, TensorError};
pub use transform::AffinityMaskRule;
pub use volume::{DevRange, InputProvider, OutputProvider, PatchCount, ProviderFactory, VolumeStore};
